//! Document rendering: every card → one LaTeX source.
//!
//! The document template is a Jinja2-style template (minijinja) that loops
//! over `cards`. Each card exposes its front-matter fields plus `qr_code`,
//! the path `\includegraphics` should load. A `latex` filter escapes free
//! text.
//!
//! When a card's QR image is missing the bare file name is substituted and a
//! [`RowWarning::MissingQrImage`] is recorded; the rest of the batch still
//! renders.

use crate::error::{GeoCardsError, RowWarning};
use crate::pipeline::cards::Card;
use crate::pipeline::input::read_template;
use crate::pipeline::qr::qr_file_name;
use crate::pipeline::sanitize::latex_escape;
use crate::templates::DEFAULT_DOCUMENT_TEMPLATE;
use minijinja::{context, Environment, Error, ErrorKind, UndefinedBehavior, Value};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-card values handed to the document template.
#[derive(Debug, Clone, Serialize)]
struct DocumentCard<'a> {
    id: &'a str,
    title: &'a str,
    contact: &'a str,
    organization: &'a str,
    description: &'a str,
    funders: &'a str,
    feasibility: &'a str,
    opportunities: &'a str,
    challenges: &'a str,
    weblink: &'a str,
    qr_code_filename: String,
    qr_code: String,
}

/// Load the document template source.
///
/// * `None` → the built-in template
/// * an existing path → its contents
/// * a missing path → the built-in template, also written to that path
pub fn resolve_document_template(path: Option<&Path>) -> Result<String, GeoCardsError> {
    let Some(path) = path else {
        return Ok(DEFAULT_DOCUMENT_TEMPLATE.to_string());
    };
    if path.exists() {
        return read_template(path);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| GeoCardsError::write(parent, e))?;
    }
    std::fs::write(path, DEFAULT_DOCUMENT_TEMPLATE).map_err(|e| GeoCardsError::write(path, e))?;
    info!("Created default document template at {}", path.display());
    Ok(DEFAULT_DOCUMENT_TEMPLATE.to_string())
}

/// Path to put in the document for a card's QR image.
///
/// Existing images are referenced by absolute path so the compiler can be
/// run from any working directory.
fn qr_reference(card: &Card, qr_dir: &Path) -> (String, Option<RowWarning>) {
    let filename = if card.qr_code_filename.is_empty() {
        qr_file_name(&card.id)
    } else {
        card.qr_code_filename.clone()
    };
    let expected = qr_dir.join(&filename);

    if expected.is_file() {
        let absolute = std::fs::canonicalize(&expected)
            .or_else(|_| std::path::absolute(&expected))
            .unwrap_or(expected);
        (absolute.display().to_string(), None)
    } else {
        let warning = RowWarning::MissingQrImage {
            id: card.id.clone(),
            expected,
        };
        (filename, Some(warning))
    }
}

/// Render `cards` through `template`.
///
/// With `strict` set, referencing a value the context does not provide is a
/// render error; otherwise it renders empty.
pub fn render_document(
    cards: &[Card],
    template: &str,
    qr_dir: &Path,
    strict: bool,
) -> Result<(String, Vec<RowWarning>), GeoCardsError> {
    let mut warnings = Vec::new();
    let mut context_cards = Vec::with_capacity(cards.len());

    for card in cards {
        let (qr_code, warning) = qr_reference(card, qr_dir);
        if let Some(w) = warning {
            warn!("{w}");
            warnings.push(w);
        }
        context_cards.push(DocumentCard {
            id: &card.id,
            title: &card.title,
            contact: &card.contact,
            organization: &card.organization,
            description: &card.description,
            funders: &card.funders,
            feasibility: &card.feasibility,
            opportunities: &card.opportunities,
            challenges: &card.challenges,
            weblink: &card.weblink,
            qr_code_filename: card.qr_code_filename.clone(),
            qr_code,
        });
    }

    let mut env = Environment::new();
    env.set_undefined_behavior(if strict {
        UndefinedBehavior::Strict
    } else {
        UndefinedBehavior::Lenient
    });
    env.add_filter("latex", move |value: Value| -> Result<String, Error> {
        if value.is_undefined() {
            if strict {
                return Err(Error::new(
                    ErrorKind::UndefinedError,
                    "undefined value passed to the latex filter",
                ));
            }
            return Ok(String::new());
        }
        if value.is_none() {
            return Ok(String::new());
        }
        Ok(latex_escape(&value.to_string()))
    });

    let rendered = env
        .render_str(template, context! { cards => context_cards })
        .map_err(|e| GeoCardsError::TemplateRender(e.to_string()))?;

    debug!("Rendered {} cards into {} bytes of LaTeX", cards.len(), rendered.len());
    Ok((rendered, warnings))
}

/// Write the rendered document to `path`, creating parent directories.
pub fn write_document(path: &Path, content: &str) -> Result<PathBuf, GeoCardsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| GeoCardsError::write(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| GeoCardsError::write(path, e))?;
    info!("LaTeX document written to {}", path.display());
    Ok(path.to_path_buf())
}
