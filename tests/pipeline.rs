//! Integration tests for the full card pipeline.
//!
//! Every test runs in its own temporary directory and never needs pandoc or
//! LaTeX: compilation is either skipped or handled by in-process backends.
//! Tests against the real toolchain live in `tests/e2e.rs`.

use geocards::pipeline::compile::CompilerBackend;
use geocards::pipeline::headers::{CanonicalField, HeaderMapping, LinePrompter};
use geocards::pipeline::qr::METADATA_FILE;
use geocards::pipeline::template::UnknownPlaceholder;
use geocards::templates::PAGE_BREAK;
use geocards::{
    compile_cards, generate, CompileError, CompileOutcome, DocumentOptions, GenerationConfig,
    GenerationProgressCallback, GeoCardsError, RowWarning, Stage, Table,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

const ROWS: [[&str; 10]; 3] = [
    [
        "101",
        "Ada Lovelace",
        "Parks Dept",
        "Restore the wetland & add a boardwalk",
        "Yes",
        "Volunteers are ready",
        "Permits",
        "County",
        "-93.4983",
        "44.9736",
    ],
    [
        "7",
        "Grace Hopper",
        "Watershed District",
        "Rain gardens along 3rd St",
        "Maybe",
        "Neighbours want it",
        "Budget, 50% short",
        "State grant",
        "-93.5",
        "44.98",
    ],
    [
        "33",
        "Alan Turing",
        "",
        "Pollinator corridor",
        "No",
        "",
        "Land ownership",
        "",
        "-93.47",
        "44.96",
    ],
];

fn canonical_headers() -> Vec<String> {
    CanonicalField::all_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn rows() -> Vec<Vec<String>> {
    ROWS.iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
}

fn write_table(path: &Path, headers: Vec<String>, rows: Vec<Vec<String>>) {
    Table::new(headers, rows).write_csv(path).unwrap();
}

fn write_submissions(dir: &Path) -> PathBuf {
    let path = dir.join("submissions.csv");
    write_table(&path, canonical_headers(), rows());
    path
}

fn base_config(dir: &Path, input: &Path) -> geocards::GenerationConfigBuilder {
    GenerationConfig::builder()
        .input(input)
        .output_dir(dir.join("output"))
        .qr_dir(dir.join("qr_codes"))
}

fn count_files(dir: &Path, ext: &str) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == ext))
        .count()
}

/// In-process backend: either writes a placeholder PDF or fails.
struct ScriptedBackend {
    name: &'static str,
    succeeds: bool,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(name: &'static str, succeeds: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            succeeds,
            calls: AtomicUsize::new(0),
        })
    }
}

impl CompilerBackend for ScriptedBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn program(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    fn compile(&self, tex: &Path, pdf: &Path) -> Result<PathBuf, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(tex.is_file(), "backend called before the .tex was written");
        if self.succeeds {
            std::fs::write(pdf, b"%PDF-1.5\n%scripted\n").unwrap();
            Ok(pdf.to_path_buf())
        } else {
            Err(CompileError::ToolFailed {
                backend: self.name.to_string(),
                status: "exit status: 43".into(),
                stderr: "! Undefined control sequence.".into(),
            })
        }
    }
}

// ── End to end ───────────────────────────────────────────────────────────────

#[test]
fn three_rows_produce_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();

    let out = generate(&config).unwrap();

    // QR images and metadata, in input order.
    let qr_dir = dir.path().join("qr_codes");
    assert_eq!(out.qr_codes.len(), 3);
    assert_eq!(count_files(&qr_dir, "png"), 3);
    let meta = Table::read_csv(&qr_dir.join(METADATA_FILE)).unwrap();
    assert_eq!(meta.len(), 3);
    let ids: Vec<&str> = (0..3).map(|i| meta.cell(i, "id").unwrap()).collect();
    assert_eq!(ids, vec!["101", "7", "33"]);
    assert_eq!(meta.cell(1, "filename"), Some("qr_7.png"));

    // Links table.
    let links = Table::read_csv(&out.links_table).unwrap();
    assert!(out.links_table.ends_with("submissions_with_links.csv"));
    assert_eq!(
        links.cell(0, "WebLink"),
        Some("https://www.google.com/maps?q=44.9736,-93.4983&t=k&z=18")
    );

    // Cards.
    assert_eq!(out.cards.len(), 3);
    assert_eq!(count_files(&out.cards_dir, "md"), 3);
    let card = std::fs::read_to_string(out.cards_dir.join("card_7.md")).unwrap();
    assert!(card.contains("title: Project 7"));
    assert!(card.contains("Grace Hopper"));
    assert!(!card.contains("{{contact}}"));

    // Document: three blocks, two breaks, cards in natural id order.
    let tex = std::fs::read_to_string(&out.document.tex).unwrap();
    assert_eq!(tex.matches("\\begin{mdframed}").count(), 3);
    assert_eq!(tex.matches(PAGE_BREAK).count(), 2);
    let p7 = tex.find("Project 7").unwrap();
    let p33 = tex.find("Project 33").unwrap();
    let p101 = tex.find("Project 101").unwrap();
    assert!(p7 < p33 && p33 < p101);
    assert!(tex.contains("Restore the wetland \\& add a boardwalk"));
    assert!(tex.contains("50\\% short"));

    assert_eq!(out.document.outcome, CompileOutcome::Skipped);
    assert!(out.warnings.is_empty());
    assert_eq!(out.stats.rows, 3);
}

#[test]
fn rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();

    let first = generate(&config).unwrap();
    let tex_first = std::fs::read_to_string(&first.document.tex).unwrap();
    let png_first = std::fs::read(&first.qr_codes[0].path).unwrap();

    let second = generate(&config).unwrap();
    assert_eq!(std::fs::read_to_string(&second.document.tex).unwrap(), tex_first);
    assert_eq!(std::fs::read(&second.qr_codes[0].path).unwrap(), png_first);
    assert_eq!(count_files(&second.cards_dir, "md"), 3);
}

#[test]
fn header_variants_and_bom_are_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.csv");

    let mut headers = canonical_headers();
    headers[0] = " objectid ".into();
    headers[1] = "YOUR NAME".into();
    let mut text = String::from("\u{feff}");
    let mut buf = Vec::new();
    {
        let mut w = csv_writer(&mut buf);
        w.write_record(&headers).unwrap();
        for r in rows() {
            w.write_record(&r).unwrap();
        }
        w.flush().unwrap();
    }
    text.push_str(std::str::from_utf8(&buf).unwrap());
    std::fs::write(&input, text).unwrap();

    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();
    let out = generate(&config).unwrap();

    assert!(out.header_map.is_complete());
    assert_eq!(out.header_map.actual_for("OBJECTID"), Some(" objectid "));
    let links = Table::read_csv(&out.links_table).unwrap();
    assert_eq!(links.headers()[0], "OBJECTID");
    assert_eq!(links.headers()[1], "Your Name");
}

fn csv_writer(buf: &mut Vec<u8>) -> csv::Writer<&mut Vec<u8>> {
    csv::Writer::from_writer(buf)
}

#[test]
fn custom_zoom_reaches_links_and_cards() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let config = base_config(dir.path(), &input)
        .zoom(15)
        .skip_compile(true)
        .build()
        .unwrap();

    let out = generate(&config).unwrap();
    assert!(out.qr_codes.iter().all(|q| q.url.ends_with("&t=k&z=15")));
    let card = std::fs::read_to_string(out.cards_dir.join("card_101.md")).unwrap();
    assert!(card.contains("&z=15"));
}

// ── Header failures ──────────────────────────────────────────────────────────

#[test]
fn missing_objectid_writes_template_and_generates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("submissions.csv");
    let headers: Vec<String> = canonical_headers().into_iter().skip(1).collect();
    let data: Vec<Vec<String>> = rows().into_iter().map(|r| r[1..].to_vec()).collect();
    write_table(&input, headers, data);

    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();
    let err = generate(&config).unwrap_err();

    match &err {
        GeoCardsError::MissingHeaders { missing, template } => {
            assert_eq!(missing, &vec!["OBJECTID".to_string()]);
            let blank = Table::read_csv(template).unwrap();
            assert_eq!(blank.headers(), canonical_headers().as_slice());
            assert!(blank.is_empty());
        }
        other => panic!("expected MissingHeaders, got {other:?}"),
    }
    assert!(!dir.path().join("output/cards").exists());
    assert!(!dir.path().join("qr_codes").exists());
}

#[test]
fn operator_corrections_are_saved_and_reused() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("submissions.csv");
    let mut headers = canonical_headers();
    headers[0] = "Submission ID".into();
    write_table(&input, headers, rows());
    let mapping_path = dir.path().join("mapping.json");

    // First run: the operator picks column 1 for OBJECTID.
    let prompter = Arc::new(LinePrompter::new(Cursor::new(b"1\n".to_vec()), Vec::new()));
    let config = base_config(dir.path(), &input)
        .mapping(&mapping_path)
        .prompter(prompter)
        .skip_compile(true)
        .build()
        .unwrap();
    let out = generate(&config).unwrap();
    assert_eq!(out.cards.len(), 3);

    let saved = HeaderMapping::load(&mapping_path).unwrap();
    assert_eq!(saved.get("Submission ID"), Some("OBJECTID"));

    // Second run: no prompter, the saved mapping is enough.
    let config = base_config(dir.path(), &input)
        .mapping(&mapping_path)
        .skip_compile(true)
        .build()
        .unwrap();
    assert!(generate(&config).is_ok());
}

// ── Row validation ───────────────────────────────────────────────────────────

#[test]
fn non_numeric_coordinate_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("submissions.csv");
    let mut data = rows();
    data[2][9] = "north".into();
    write_table(&input, canonical_headers(), data);

    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();
    let err = generate(&config).unwrap_err();
    assert!(
        matches!(err, GeoCardsError::InvalidCoordinate { row: 3, ref column, .. } if column == "y"),
        "got {err:?}"
    );
}

#[test]
fn duplicate_identifiers_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("submissions.csv");
    let mut data = rows();
    data[2][0] = "7".into();
    write_table(&input, canonical_headers(), data);

    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();
    let err = generate(&config).unwrap_err();
    assert!(matches!(
        err,
        GeoCardsError::DuplicateIdentifier {
            row: 3,
            first_row: 2,
            ..
        }
    ));
}

#[test]
fn path_like_identifier_is_fatal_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("submissions.csv");
    let mut data = rows();
    data[1][0] = "a/../../escaped".into();
    write_table(&input, canonical_headers(), data);

    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();
    let err = generate(&config).unwrap_err();
    assert!(
        matches!(err, GeoCardsError::UnsafeIdentifier { row: 2, .. }),
        "{err}"
    );
    assert!(!dir.path().join("qr_codes").exists());
    assert!(!dir.path().join("escaped.png").exists());
    assert!(!dir.path().parent().unwrap().join("escaped.png").exists());
}

#[test]
fn multi_line_answers_survive_the_card_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("submissions.csv");
    let mut data = rows();
    data[0][3] = "Phase one\n---\nPhase two".into();
    data[0][5] = "Goals\ntitle: boardwalk".into();
    write_table(&input, canonical_headers(), data);

    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();
    let out = generate(&config).unwrap();

    let cards = geocards::pipeline::cards::load_cards(&out.cards_dir).unwrap();
    let card = cards.iter().find(|c| c.id == "101").unwrap();
    assert_eq!(card.title, "Project 101");
    assert_eq!(card.description, "Phase one\n---\nPhase two");
    assert_eq!(card.opportunities, "Goals\ntitle: boardwalk");
    assert_eq!(card.funders, "County");
    assert_eq!(card.qr_code_filename, "qr_101.png");
    assert!(out.warnings.is_empty());
}

#[test]
fn missing_input_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path(), &dir.path().join("nope.csv"))
        .build()
        .unwrap();
    assert!(matches!(
        generate(&config).unwrap_err(),
        GeoCardsError::FileNotFound { .. }
    ));
}

// ── Templates ────────────────────────────────────────────────────────────────

#[test]
fn unknown_card_placeholder_policy() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let template = dir.path().join("card.md");
    std::fs::write(&template, "---\ntitle: {{title}}\n---\nBudget: {{budget}}\n").unwrap();

    let lenient = base_config(dir.path(), &input)
        .card_template(&template)
        .skip_compile(true)
        .build()
        .unwrap();
    let out = generate(&lenient).unwrap();
    let card = std::fs::read_to_string(out.cards_dir.join("card_7.md")).unwrap();
    assert!(card.contains("Budget: {{budget}}"));

    let strict = base_config(dir.path(), &input)
        .card_template(&template)
        .unknown_placeholders(UnknownPlaceholder::Error)
        .skip_compile(true)
        .build()
        .unwrap();
    assert!(matches!(
        generate(&strict).unwrap_err(),
        GeoCardsError::UnknownPlaceholder { ref name } if name == "budget"
    ));
}

#[test]
fn missing_document_template_is_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let doc_template = dir.path().join("templates/cards.tex");

    let config = base_config(dir.path(), &input)
        .document_template(&doc_template)
        .skip_compile(true)
        .build()
        .unwrap();
    generate(&config).unwrap();
    assert_eq!(
        std::fs::read_to_string(&doc_template).unwrap(),
        geocards::templates::DEFAULT_DOCUMENT_TEMPLATE
    );
}

// ── Compilation ──────────────────────────────────────────────────────────────

#[test]
fn second_backend_wins_after_first_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let first = ScriptedBackend::new("first", false);
    let second = ScriptedBackend::new("second", true);

    let config = base_config(dir.path(), &input)
        .backends(vec![first.clone(), second.clone()])
        .build()
        .unwrap();
    let out = generate(&config).unwrap();

    let pdf = dir.path().join("output/printable_cards.pdf");
    assert_eq!(
        out.document.outcome,
        CompileOutcome::Compiled {
            backend: "second".into(),
            pdf: pdf.clone()
        }
    );
    assert_eq!(out.pdf(), Some(&pdf));
    assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn all_backends_failing_keeps_the_tex() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let config = base_config(dir.path(), &input)
        .backends(vec![
            ScriptedBackend::new("first", false),
            ScriptedBackend::new("second", false),
        ])
        .build()
        .unwrap();

    match generate(&config).unwrap_err() {
        GeoCardsError::CompilationFailed { tex, attempts } => {
            assert!(tex.is_file());
            assert_eq!(attempts.len(), 2);
        }
        other => panic!("expected CompilationFailed, got {other:?}"),
    }
    assert!(!dir.path().join("output/printable_cards.pdf").exists());
}

#[test]
fn missing_qr_image_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .build()
        .unwrap();
    let out = generate(&config).unwrap();

    std::fs::remove_file(dir.path().join("qr_codes/qr_33.png")).unwrap();

    let pdf = dir.path().join("output/printable_cards.pdf");
    let doc = compile_cards(
        &out.cards_dir,
        &DocumentOptions {
            document_template: None,
            qr_dir: &dir.path().join("qr_codes"),
            output_pdf: &pdf,
            skip_compile: true,
            strict_templates: false,
            backends: &[],
            progress: None,
        },
    )
    .unwrap();

    assert_eq!(doc.cards, 3);
    assert_eq!(doc.warnings.len(), 1);
    assert!(matches!(&doc.warnings[0], RowWarning::MissingQrImage { id, .. } if id == "33"));
    let tex = std::fs::read_to_string(&doc.tex).unwrap();
    assert!(tex.contains("{qr_33.png}"));
    assert_eq!(tex.matches("\\begin{mdframed}").count(), 3);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingProgress {
    started: AtomicUsize,
    qr_rows: AtomicUsize,
    card_rows: AtomicUsize,
    finished: AtomicUsize,
}

impl GenerationProgressCallback for CountingProgress {
    fn on_run_start(&self, total_rows: usize) {
        self.started.store(total_rows, Ordering::SeqCst);
    }

    fn on_row_complete(&self, stage: Stage, _row: usize, _total: usize, _id: &str) {
        match stage {
            Stage::QrCodes => self.qr_rows.fetch_add(1, Ordering::SeqCst),
            Stage::Cards => self.card_rows.fetch_add(1, Ordering::SeqCst),
            _ => 0,
        };
    }

    fn on_run_complete(&self, total_rows: usize, _warning_count: usize) {
        self.finished.store(total_rows, Ordering::SeqCst);
    }
}

#[test]
fn progress_events_cover_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let progress = Arc::new(CountingProgress::default());
    let config = base_config(dir.path(), &input)
        .skip_compile(true)
        .progress_callback(progress.clone())
        .build()
        .unwrap();

    generate(&config).unwrap();
    assert_eq!(progress.started.load(Ordering::SeqCst), 3);
    assert_eq!(progress.qr_rows.load(Ordering::SeqCst), 3);
    assert_eq!(progress.card_rows.load(Ordering::SeqCst), 3);
    assert_eq!(progress.finished.load(Ordering::SeqCst), 3);
}
