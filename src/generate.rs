//! Pipeline entry points.
//!
//! ## Why two entry points?
//!
//! [`generate`] runs every stage from the submissions table to the PDF.
//! [`compile_cards`] runs only the last two stages over an existing card
//! directory, so operators can hand-edit cards and rebuild the printout
//! without regenerating QR codes.

use crate::config::GenerationConfig;
use crate::error::{GeoCardsError, RowWarning};
use crate::output::{CompileOutcome, DocumentOutput, GenerationOutput, GenerationStats};
use crate::pipeline::compile::{compile_with_fallback, default_backends, CompilerBackend};
use crate::pipeline::headers::ReconcileOptions;
use crate::pipeline::qr::{QrOptions, METADATA_FILE};
use crate::pipeline::template::UnknownPlaceholder;
use crate::pipeline::{cards, document, headers, input, links, qr};
use crate::progress::{ProgressCallback, Stage};
use crate::templates::DEFAULT_CARD_TEMPLATE;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run the full pipeline described by `config`.
///
/// # Returns
/// `Ok(GenerationOutput)` on success, even if some rows produced warnings
/// (check `output.warnings`).
///
/// # Errors
/// Returns `Err(GeoCardsError)` for fatal errors:
/// - input table missing, unreadable or malformed
/// - required headers still missing after reconciliation (a blank template
///   table is written first)
/// - a configured card template that does not exist
/// - every compiler backend failed (the `.tex` file is kept)
pub fn generate(config: &GenerationConfig) -> Result<GenerationOutput, GeoCardsError> {
    let total_start = Instant::now();
    info!("Starting card generation: {}", config.input.display());
    let progress = config.progress_callback.as_ref();

    // ── Step 1: Load input ───────────────────────────────────────────────
    let mut table = input::resolve_input(&config.input)?;

    // ── Step 2: Reconcile headers ────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_stage_start(Stage::Headers, table.headers().len());
    }
    let mapping_save_path = config.mapping_save_path();
    let template_table = config.template_table();
    let header_map = headers::reconcile_table(
        &mut table,
        &ReconcileOptions {
            mapping: config.mapping.as_deref(),
            mapping_save_path: &mapping_save_path,
            template_table: &template_table,
            prompter: config.prompter.as_deref(),
        },
    )?;
    info!("Headers reconciled: {} fields matched", header_map.matches.len());

    // Fail on a bad card template before any file is written.
    let card_template = match &config.card_template {
        Some(path) => input::read_template(path)?,
        None => DEFAULT_CARD_TEMPLATE.to_string(),
    };

    // ── Step 3: Validate rows and build links ────────────────────────────
    let submissions = links::submissions(&table, config.zoom)?;
    let total_rows = submissions.len();
    if let Some(cb) = progress {
        cb.on_run_start(total_rows);
        cb.on_stage_start(Stage::Links, total_rows);
    }
    links::add_link_column(&mut table, config.zoom)?;
    let links_table = config.links_table();
    links::write_links_table(&table, &links_table)?;
    if let Some(cb) = progress {
        for (i, sub) in submissions.iter().enumerate() {
            cb.on_row_complete(Stage::Links, i + 1, total_rows, &sub.id);
        }
    }

    // ── Step 4: Render QR codes ──────────────────────────────────────────
    let qr_start = Instant::now();
    let qr_codes = qr::render_all(
        &submissions,
        &config.qr_dir,
        QrOptions {
            box_size: config.box_size,
        },
        progress,
    )?;
    let qr_duration_ms = qr_start.elapsed().as_millis() as u64;

    // ── Step 5: Compose cards ────────────────────────────────────────────
    let cards_dir = config.cards_dir();
    let card_files = cards::compose_all(
        &submissions,
        &card_template,
        &cards_dir,
        &config.qr_dir,
        config.unknown_placeholders,
        progress,
    )?;

    // ── Step 6: Render and compile the document ──────────────────────────
    let backends = config
        .backends
        .clone()
        .unwrap_or_else(|| default_backends(&config.latex_engine));
    let output_pdf = config.output_pdf();
    let compile_start = Instant::now();
    let doc = compile_cards(
        &cards_dir,
        &DocumentOptions {
            document_template: config.document_template.as_deref(),
            qr_dir: &config.qr_dir,
            output_pdf: &output_pdf,
            skip_compile: config.skip_compile,
            strict_templates: config.unknown_placeholders == UnknownPlaceholder::Error,
            backends: &backends,
            progress,
        },
    )?;
    let compile_duration_ms = compile_start.elapsed().as_millis() as u64;

    // ── Step 7: Stats ────────────────────────────────────────────────────
    let warnings: Vec<RowWarning> = doc.warnings.clone();
    let stats = GenerationStats {
        rows: total_rows,
        qr_codes: qr_codes.len(),
        cards: card_files.len(),
        warnings: warnings.len(),
        qr_duration_ms,
        compile_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Generation complete: {} rows, {} warnings, {}ms total",
        stats.rows, stats.warnings, stats.total_duration_ms
    );
    if let Some(cb) = progress {
        cb.on_run_complete(total_rows, warnings.len());
    }

    Ok(GenerationOutput {
        header_map,
        links_table,
        qr_codes,
        qr_metadata: config.qr_dir.join(METADATA_FILE),
        cards_dir,
        cards: card_files,
        document: doc,
        warnings,
        stats,
    })
}

/// Inputs for [`compile_cards`].
pub struct DocumentOptions<'a> {
    /// Document template path. None uses the built-in template; a missing
    /// path is created with it.
    pub document_template: Option<&'a Path>,
    /// Directory the cards' QR images are looked up in.
    pub qr_dir: &'a Path,
    /// Final PDF path. The `.tex` is written beside it with the same stem.
    pub output_pdf: &'a Path,
    pub skip_compile: bool,
    /// Fail on undefined template values instead of rendering them empty.
    pub strict_templates: bool,
    /// Backends tried in order.
    pub backends: &'a [Arc<dyn CompilerBackend>],
    pub progress: Option<&'a ProgressCallback>,
}

/// Render every card in `cards_dir` into one document and compile it.
///
/// A card whose QR image is missing yields a warning, not an error. When
/// every backend fails the `.tex` file is left in place and
/// [`GeoCardsError::CompilationFailed`] lists each attempt.
pub fn compile_cards(
    cards_dir: &Path,
    options: &DocumentOptions<'_>,
) -> Result<DocumentOutput, GeoCardsError> {
    let cards = cards::load_cards(cards_dir)?;
    info!("Loaded {} cards from {}", cards.len(), cards_dir.display());
    if cards.is_empty() {
        warn!("No card files in {}", cards_dir.display());
    }

    if let Some(cb) = options.progress {
        cb.on_stage_start(Stage::Document, cards.len());
    }
    let template = document::resolve_document_template(options.document_template)?;
    let (tex_source, warnings) = document::render_document(
        &cards,
        &template,
        options.qr_dir,
        options.strict_templates,
    )?;
    if let Some(cb) = options.progress {
        for w in &warnings {
            let RowWarning::MissingQrImage { id, .. } = w;
            cb.on_row_warning(id, &w.to_string());
        }
    }

    let tex = document::write_document(&options.output_pdf.with_extension("tex"), &tex_source)?;

    let outcome = if options.skip_compile {
        info!("Skipping PDF compilation; document kept at {}", tex.display());
        CompileOutcome::Skipped
    } else {
        if let Some(cb) = options.progress {
            cb.on_stage_start(Stage::Compile, options.backends.len());
        }
        match compile_with_fallback(options.backends, &tex, options.output_pdf, options.progress) {
            Ok((backend, pdf)) => CompileOutcome::Compiled { backend, pdf },
            Err(attempts) => {
                return Err(GeoCardsError::CompilationFailed { tex, attempts });
            }
        }
    };
    debug!("Document outcome: {outcome:?}");

    Ok(DocumentOutput {
        tex,
        cards: cards.len(),
        outcome,
        warnings,
    })
}
