//! Card composition and parsing.
//!
//! Composition fills the card template once per submission and writes
//! `card_<id>.md`. Parsing reads those files back for the document stage, so
//! the card directory can be hand-edited between the two.
//!
//! ## Front matter
//!
//! Cards start with a `---` delimited block of `key: value` lines. Values
//! substituted from survey answers may span several lines and may contain
//! colons, so only a line at column 0 naming one of [`CARD_KEYS`] starts a
//! new entry, and only a column-0 `---` closes the block; every other line
//! continues the previous entry. [`card_fields`] indents the continuation
//! lines of every value so answer text can never reach column 0.

use crate::error::GeoCardsError;
use crate::output::CardArtifact;
use crate::pipeline::links::Submission;
use crate::pipeline::qr::qr_file_name;
use crate::pipeline::sanitize::{clean_block_text, clean_field};
use crate::pipeline::template::{render_placeholders, Fields, UnknownPlaceholder};
use crate::progress::{ProgressCallback, Stage};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Front-matter keys recognised by [`parse_card`].
pub const CARD_KEYS: &[&str] = &[
    "title",
    "contact",
    "organization",
    "description",
    "funders",
    "feasibility",
    "feasible_3yr",
    "opportunities",
    "challenges",
    "qr_code_filename",
    "weblink",
];

const CARD_PREFIX: &str = "card_";
const CARD_EXT: &str = "md";
const CONTINUATION_INDENT: &str = "  ";

/// Deterministic file name for a row's card.
pub fn card_file_name(id: &str) -> String {
    format!("{CARD_PREFIX}{id}.{CARD_EXT}")
}

/// Every placeholder value available to a card template.
///
/// Several names are aliases kept for older templates
/// (`contact_person`, `potential_funders`, `feasibility_next_3_years`,
/// `feasible_3yr`).
pub fn card_fields(sub: &Submission, qr_dir: &Path) -> Fields {
    let qr_name = qr_file_name(&sub.id);
    let text = |s: &str| indent_continuation(&clean_field(s));
    let contact = text(&sub.name);
    let funders = text(&sub.funders);
    let feasibility = text(&sub.feasibility);

    let pairs = [
        ("id", sub.id.clone()),
        ("title", format!("Project {}", sub.id)),
        ("contact", contact.clone()),
        ("contact_person", contact),
        ("organization", text(&sub.organization)),
        ("description", text(&sub.description)),
        ("funders", funders.clone()),
        ("potential_funders", funders),
        ("feasibility", feasibility.clone()),
        ("feasibility_next_3_years", feasibility.clone()),
        ("feasible_3yr", feasibility),
        ("opportunities", text(&sub.opportunities)),
        ("challenges", text(&sub.challenges)),
        ("qr_code", qr_dir.join(&qr_name).display().to_string()),
        ("qr_code_filename", qr_name),
        ("weblink", sub.link.clone()),
        ("latitude", sub.y.to_string()),
        ("longitude", sub.x.to_string()),
    ];

    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Indent every line after the first by two spaces.
fn indent_continuation(value: &str) -> String {
    value.replace('\n', &format!("\n{CONTINUATION_INDENT}"))
}

/// Fill `template` for one submission.
pub fn compose_card(
    sub: &Submission,
    template: &str,
    qr_dir: &Path,
    unknown: UnknownPlaceholder,
) -> Result<String, GeoCardsError> {
    render_placeholders(template, &card_fields(sub, qr_dir), unknown)
}

/// Write one card per submission into `cards_dir`.
///
/// Card files left over from an earlier run are removed first so the
/// directory mirrors the current table.
pub fn compose_all(
    submissions: &[Submission],
    template: &str,
    cards_dir: &Path,
    qr_dir: &Path,
    unknown: UnknownPlaceholder,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<CardArtifact>, GeoCardsError> {
    std::fs::create_dir_all(cards_dir).map_err(|e| GeoCardsError::write(cards_dir, e))?;
    remove_stale_cards(cards_dir)?;

    let total = submissions.len();
    if let Some(cb) = progress {
        cb.on_stage_start(Stage::Cards, total);
    }

    let mut artifacts = Vec::with_capacity(total);
    for (i, sub) in submissions.iter().enumerate() {
        let content = compose_card(sub, template, qr_dir, unknown)?;
        let path = cards_dir.join(card_file_name(&sub.id));
        std::fs::write(&path, content).map_err(|e| GeoCardsError::write(&path, e))?;
        debug!("Wrote card {}", path.display());
        if let Some(cb) = progress {
            cb.on_row_complete(Stage::Cards, i + 1, total, &sub.id);
        }
        artifacts.push(CardArtifact {
            id: sub.id.clone(),
            path,
        });
    }

    info!("Created {} card files in {}", artifacts.len(), cards_dir.display());
    Ok(artifacts)
}

fn remove_stale_cards(cards_dir: &Path) -> Result<(), GeoCardsError> {
    for path in card_paths(cards_dir)? {
        std::fs::remove_file(&path).map_err(|e| GeoCardsError::write(&path, e))?;
        debug!("Removed stale card {}", path.display());
    }
    Ok(())
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// A card as read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Identifier taken from the file name (`card_<id>.md`).
    pub id: String,
    pub title: String,
    pub contact: String,
    pub organization: String,
    pub description: String,
    pub funders: String,
    pub feasibility: String,
    pub opportunities: String,
    pub challenges: String,
    pub qr_code_filename: String,
    pub weblink: String,
}

/// Parse a card file's front matter. `file_name` supplies the identifier and
/// the fallback title.
pub fn parse_card(text: &str, file_name: &str) -> Card {
    let entries = front_matter(text);
    let get = |key: &str| entries.get(key).map(String::as_str).unwrap_or_default();

    let title = clean_field(get("title"));
    let feasibility = match clean_field(get("feasibility")) {
        f if f.is_empty() => clean_field(get("feasible_3yr")),
        f => f,
    };

    Card {
        id: card_id(file_name),
        title: if title.is_empty() {
            format!("Card {file_name}")
        } else {
            title
        },
        contact: clean_field(get("contact")),
        organization: clean_field(get("organization")),
        description: clean_block_text(get("description")),
        funders: clean_field(get("funders")),
        feasibility,
        opportunities: clean_block_text(get("opportunities")),
        challenges: clean_block_text(get("challenges")),
        qr_code_filename: clean_field(get("qr_code_filename")),
        weblink: clean_field(get("weblink")),
    }
}

/// Collect raw `key → value` entries from the leading `---` block.
fn front_matter(text: &str) -> BTreeMap<String, String> {
    let mut entries: BTreeMap<String, String> = BTreeMap::new();
    let mut lines = text.lines();

    if lines.next().map(str::trim_end) != Some("---") {
        return entries;
    }

    let mut current: Option<String> = None;
    for line in lines {
        if line.trim_end() == "---" {
            break;
        }
        match split_key(line) {
            Some((key, value)) => {
                entries.insert(key.to_string(), value.trim().to_string());
                current = Some(key.to_string());
            }
            None => {
                if let Some(entry) = current.as_ref().and_then(|k| entries.get_mut(k)) {
                    entry.push('\n');
                    entry.push_str(line.strip_prefix(CONTINUATION_INDENT).unwrap_or(line));
                }
            }
        }
    }
    entries
}

fn split_key(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    CARD_KEYS.contains(&key).then_some((key, value))
}

fn card_id(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.strip_prefix(CARD_PREFIX).unwrap_or(&stem).to_string()
}

/// `card_*.md` files directly inside `dir`, unsorted.
fn card_paths(dir: &Path) -> Result<Vec<PathBuf>, GeoCardsError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GeoCardsError::FileNotFound {
            path: dir.to_path_buf(),
        },
        _ => GeoCardsError::PermissionDenied {
            path: dir.to_path_buf(),
        },
    })?;

    Ok(entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().is_some_and(|x| x == CARD_EXT))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(CARD_PREFIX))
        })
        .collect())
}

/// Load every card in `dir`, ordered naturally by identifier.
pub fn load_cards(dir: &Path) -> Result<Vec<Card>, GeoCardsError> {
    let mut cards = Vec::new();
    for path in card_paths(dir)? {
        let text = std::fs::read_to_string(&path).map_err(|e| read_error(&path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        cards.push(parse_card(&text, &file_name));
    }
    cards.sort_by(|a, b| natural_cmp(&a.id, &b.id));
    debug!("Loaded {} cards from {}", cards.len(), dir.display());
    Ok(cards)
}

fn read_error(path: &Path, e: std::io::Error) -> GeoCardsError {
    match e.kind() {
        std::io::ErrorKind::NotFound => GeoCardsError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => GeoCardsError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => GeoCardsError::UnreadableCard {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

/// Numeric identifiers sort numerically and before textual ones.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
