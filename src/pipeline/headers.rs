//! Header reconciliation: map the table's actual column names onto the
//! canonical fields the pipeline expects.
//!
//! Spreadsheets exported from survey tools rarely keep column names stable:
//! a trailing space sneaks in, or someone re-types `OBJECTID` as `ObjectId`.
//! Matching runs an ordered list of [`MatchStrategy`]s per canonical name and
//! keeps the first hit, so adding a looser strategy is one more entry in the
//! list, not another branch.
//!
//! When some fields are still missing, a blank template table with exactly
//! the canonical headers is written for the operator, and the run fails. An
//! optional [`MappingPrompter`] lets an operator pick the right columns
//! instead; the answers are saved as a [`HeaderMapping`] JSON file and
//! applied up front on the next run.

use crate::error::GeoCardsError;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::{BufRead, BufReader, Stderr, Stdin, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

// ── Canonical fields ─────────────────────────────────────────────────────────

/// The columns every submissions table must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    ObjectId,
    Name,
    Organization,
    Description,
    Feasibility,
    Opportunities,
    Challenges,
    Funders,
    X,
    Y,
}

impl CanonicalField {
    /// Every field, in template-table column order.
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::ObjectId,
        CanonicalField::Name,
        CanonicalField::Organization,
        CanonicalField::Description,
        CanonicalField::Feasibility,
        CanonicalField::Opportunities,
        CanonicalField::Challenges,
        CanonicalField::Funders,
        CanonicalField::X,
        CanonicalField::Y,
    ];

    /// Column name as it appears in the survey export.
    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::ObjectId => "OBJECTID",
            CanonicalField::Name => "Your Name",
            CanonicalField::Organization => "Your Organization",
            CanonicalField::Description => "Describe the opportunity",
            CanonicalField::Feasibility => "Is the opportunity feasible in the next 3 years?",
            CanonicalField::Opportunities => "What do you expect would go smoothly?",
            CanonicalField::Challenges => "What would you expect to be challenging?",
            CanonicalField::Funders => "Who might be a potential funder of this work?",
            CanonicalField::X => "x",
            CanonicalField::Y => "y",
        }
    }

    /// All canonical names in order.
    pub fn all_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.name()).collect()
    }
}

// ── Strategies ───────────────────────────────────────────────────────────────

/// One way of deciding that an actual column name provides a canonical one.
pub trait MatchStrategy: Send + Sync {
    /// Short label recorded in [`HeaderMatch::strategy`].
    fn name(&self) -> &'static str;

    fn matches(&self, canonical: &str, actual: &str) -> bool;
}

/// Byte-for-byte equality.
pub struct Exact;

impl MatchStrategy for Exact {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn matches(&self, canonical: &str, actual: &str) -> bool {
        canonical == actual
    }
}

/// Equality after lowercasing both sides.
pub struct CaseInsensitive;

impl MatchStrategy for CaseInsensitive {
    fn name(&self) -> &'static str {
        "case-insensitive"
    }

    fn matches(&self, canonical: &str, actual: &str) -> bool {
        canonical.to_lowercase() == actual.to_lowercase()
    }
}

/// Equality after trimming surrounding whitespace, ignoring case.
pub struct Trimmed;

impl MatchStrategy for Trimmed {
    fn name(&self) -> &'static str {
        "trimmed"
    }

    fn matches(&self, canonical: &str, actual: &str) -> bool {
        canonical.trim().to_lowercase() == actual.trim().to_lowercase()
    }
}

/// Exact, then case-insensitive, then trimmed.
pub fn default_strategies() -> Vec<Box<dyn MatchStrategy>> {
    vec![Box::new(Exact), Box::new(CaseInsensitive), Box::new(Trimmed)]
}

// ── Reconciliation ───────────────────────────────────────────────────────────

/// One resolved canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMatch {
    pub canonical: String,
    pub actual: String,
    pub strategy: String,
}

/// Result of reconciling a header row against the canonical names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMap {
    /// Matches in canonical order.
    pub matches: Vec<HeaderMatch>,
    /// Canonical names nothing matched, in canonical order.
    pub missing: Vec<String>,
}

impl HeaderMap {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// The actual column providing `canonical`, if matched.
    pub fn actual_for(&self, canonical: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|m| m.canonical == canonical)
            .map(|m| m.actual.as_str())
    }
}

/// Match `actual` column names against `required` canonical names.
///
/// For each canonical name the strategies run in order; the first strategy
/// with a hit wins, and within a strategy the leftmost unclaimed column wins.
/// A column claimed by an earlier canonical name is never reused.
pub fn reconcile(
    actual: &[String],
    required: &[&str],
    strategies: &[Box<dyn MatchStrategy>],
) -> HeaderMap {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut map = HeaderMap::default();

    for &canonical in required {
        let hit = strategies.iter().find_map(|strategy| {
            actual
                .iter()
                .enumerate()
                .find(|(i, a)| !claimed.contains(i) && strategy.matches(canonical, a))
                .map(|(i, a)| (i, a.clone(), strategy.name()))
        });

        match hit {
            Some((i, actual_name, strategy)) => {
                claimed.insert(i);
                if strategy != "exact" {
                    debug!("Header '{}' matched '{}' ({})", canonical, actual_name, strategy);
                }
                map.matches.push(HeaderMatch {
                    canonical: canonical.to_string(),
                    actual: actual_name,
                    strategy: strategy.to_string(),
                });
            }
            None => map.missing.push(canonical.to_string()),
        }
    }

    map
}

/// Rename every matched column in `table` to its canonical name.
pub fn apply_header_map(table: &mut Table, map: &HeaderMap) {
    for m in &map.matches {
        if m.actual != m.canonical {
            table.rename_column(&m.actual, &m.canonical);
        }
    }
}

// ── Persisted mapping ────────────────────────────────────────────────────────

/// Operator-provided corrections: actual column name → canonical name.
///
/// Stored as a flat JSON object so it can be edited by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderMapping(BTreeMap<String, String>);

impl HeaderMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, actual: impl Into<String>, canonical: impl Into<String>) {
        self.0.insert(actual.into(), canonical.into());
    }

    pub fn get(&self, actual: &str) -> Option<&str> {
        self.0.get(actual).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`; `other` wins on conflicts.
    pub fn extend(&mut self, other: HeaderMapping) {
        self.0.extend(other.0);
    }

    pub fn load(path: &Path) -> Result<Self, GeoCardsError> {
        let text = std::fs::read_to_string(path).map_err(|e| GeoCardsError::InvalidMapping {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| GeoCardsError::InvalidMapping {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), GeoCardsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| GeoCardsError::write(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GeoCardsError::write(path, std::io::Error::other(e)))?;
        std::fs::write(path, json + "\n").map_err(|e| GeoCardsError::write(path, e))
    }

    /// Rename the table's columns per the mapping. Returns how many columns
    /// were renamed; entries naming absent columns are ignored.
    pub fn apply(&self, table: &mut Table) -> usize {
        self.0
            .iter()
            .filter(|(actual, canonical)| actual != canonical)
            .filter(|(actual, canonical)| table.rename_column(actual, canonical))
            .count()
    }
}

// ── Operator prompts ─────────────────────────────────────────────────────────

/// Asks an operator which column provides a missing canonical field.
pub trait MappingPrompter: Send + Sync {
    /// Return the chosen column (one of `candidates`), or None to skip.
    fn choose_column(&self, canonical: &str, candidates: &[String]) -> Option<String>;
}

/// Line-oriented prompter over any reader/writer pair.
///
/// Accepts a 1-based candidate number or a column name; a blank line or end
/// of input skips the field.
pub struct LinePrompter<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead + Send, W: Write + Send> LinePrompter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

impl LinePrompter<BufReader<Stdin>, Stderr> {
    /// Prompt on stderr, read answers from stdin.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

const PROMPT_ATTEMPTS: usize = 3;

impl<R: BufRead + Send, W: Write + Send> MappingPrompter for LinePrompter<R, W> {
    fn choose_column(&self, canonical: &str, candidates: &[String]) -> Option<String> {
        let mut guard = self.io.lock().ok()?;
        let (reader, writer) = &mut *guard;

        writeln!(writer, "Missing column for '{canonical}'. Available columns:").ok()?;
        for (i, c) in candidates.iter().enumerate() {
            writeln!(writer, "  [{}] {}", i + 1, c).ok()?;
        }

        for _ in 0..PROMPT_ATTEMPTS {
            write!(writer, "Column for '{canonical}' (number or name, blank to skip): ").ok()?;
            writer.flush().ok()?;

            let mut line = String::new();
            if reader.read_line(&mut line).ok()? == 0 {
                return None;
            }
            let answer = line.trim();
            if answer.is_empty() {
                return None;
            }
            if let Ok(n) = answer.parse::<usize>() {
                if (1..=candidates.len()).contains(&n) {
                    return Some(candidates[n - 1].clone());
                }
            }
            if let Some(c) = candidates.iter().find(|c| c.as_str() == answer) {
                return Some(c.clone());
            }
            writeln!(writer, "'{answer}' is not one of the listed columns.").ok()?;
        }
        None
    }
}

/// Ask `prompter` about every missing field, offering only unclaimed columns.
pub fn collect_corrections(
    map: &HeaderMap,
    actual: &[String],
    prompter: &dyn MappingPrompter,
) -> HeaderMapping {
    let claimed: HashSet<&str> = map.matches.iter().map(|m| m.actual.as_str()).collect();
    let mut candidates: Vec<String> = actual
        .iter()
        .filter(|a| !claimed.contains(a.as_str()))
        .cloned()
        .collect();

    let mut corrections = HeaderMapping::new();
    for canonical in &map.missing {
        if candidates.is_empty() {
            break;
        }
        if let Some(chosen) = prompter.choose_column(canonical, &candidates) {
            candidates.retain(|c| c != &chosen);
            corrections.insert(chosen, canonical.clone());
        }
    }
    corrections
}

// ── Orchestration ────────────────────────────────────────────────────────────

/// Paths and collaborators for [`reconcile_table`].
pub struct ReconcileOptions<'a> {
    /// Mapping applied before matching, when the file exists.
    pub mapping: Option<&'a Path>,
    /// Where interactive corrections are saved.
    pub mapping_save_path: &'a Path,
    /// Where the blank header template goes on failure.
    pub template_table: &'a Path,
    pub prompter: Option<&'a dyn MappingPrompter>,
}

/// Reconcile `table` in place against every [`CanonicalField`].
///
/// On success the matched columns carry their canonical names. On failure a
/// header-only template is written and [`GeoCardsError::MissingHeaders`] is
/// returned; the table is left with whatever renames were applied.
pub fn reconcile_table(
    table: &mut Table,
    options: &ReconcileOptions<'_>,
) -> Result<HeaderMap, GeoCardsError> {
    let required = CanonicalField::all_names();
    let strategies = default_strategies();

    let mut persisted = HeaderMapping::new();
    if let Some(path) = options.mapping.filter(|p| p.is_file()) {
        persisted = HeaderMapping::load(path)?;
        let renamed = persisted.apply(table);
        info!(
            "Applied header mapping {} ({} of {} entries matched)",
            path.display(),
            renamed,
            persisted.len()
        );
    }

    let mut map = reconcile(table.headers(), &required, &strategies);

    if !map.is_complete() {
        if let Some(prompter) = options.prompter {
            let corrections = collect_corrections(&map, table.headers(), prompter);
            if !corrections.is_empty() {
                corrections.apply(table);
                persisted.extend(corrections);
                persisted.save(options.mapping_save_path)?;
                info!(
                    "Saved header mapping to {}",
                    options.mapping_save_path.display()
                );
                map = reconcile(table.headers(), &required, &strategies);
            }
        }
    }

    if !map.is_complete() {
        for m in &map.matches {
            warn!("  '{}' ← '{}' ({})", m.canonical, m.actual, m.strategy);
        }
        warn!("Missing required headers: {}", map.missing.join(", "));
        Table::write_header_only(options.template_table, &required)?;
        return Err(GeoCardsError::MissingHeaders {
            missing: map.missing,
            template: options.template_table.to_path_buf(),
        });
    }

    apply_header_map(table, &map);
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn full_headers() -> Vec<String> {
        names(&CanonicalField::all_names())
    }

    #[test]
    fn exact_headers_reconcile_completely() {
        let map = reconcile(&full_headers(), &CanonicalField::all_names(), &default_strategies());
        assert!(map.is_complete());
        assert!(map.matches.iter().all(|m| m.strategy == "exact"));
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let headers = full_headers();
        let required = CanonicalField::all_names();
        let first = reconcile(&headers, &required, &default_strategies());
        let second = reconcile(&headers, &required, &default_strategies());
        assert_eq!(first, second);
    }

    #[test]
    fn case_and_whitespace_variants_resolve_to_objectid() {
        for variant in ["objectid", " OBJECTID ", " ObjectId\t"] {
            let map = reconcile(&names(&[variant]), &["OBJECTID"], &default_strategies());
            assert_eq!(map.actual_for("OBJECTID"), Some(variant), "{variant:?}");
        }
    }

    #[test]
    fn strategy_priority_prefers_exact_over_looser() {
        let headers = names(&["objectid", "OBJECTID"]);
        let map = reconcile(&headers, &["OBJECTID"], &default_strategies());
        assert_eq!(map.actual_for("OBJECTID"), Some("OBJECTID"));
        assert_eq!(map.matches[0].strategy, "exact");
    }

    #[test]
    fn claimed_columns_are_not_reused() {
        let headers = names(&["X"]);
        let map = reconcile(&headers, &["x", "X"], &default_strategies());
        assert_eq!(map.actual_for("x"), Some("X"));
        assert_eq!(map.missing, vec!["X"]);
    }

    #[test]
    fn missing_fields_are_reported_in_order() {
        let mut headers = full_headers();
        headers.retain(|h| h != "OBJECTID" && h != "y");
        let map = reconcile(&headers, &CanonicalField::all_names(), &default_strategies());
        assert_eq!(map.missing, vec!["OBJECTID", "y"]);
    }

    #[test]
    fn apply_header_map_canonicalises_names() {
        let mut table = Table::new(names(&[" objectid", "X", "y"]), vec![]);
        let map = reconcile(table.headers(), &["OBJECTID", "x", "y"], &default_strategies());
        apply_header_map(&mut table, &map);
        assert_eq!(table.headers(), &["OBJECTID", "x", "y"]);
    }

    #[test]
    fn mapping_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        let mut m = HeaderMapping::new();
        m.insert("ID", "OBJECTID");
        m.insert("Longitude", "x");
        m.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"ID\": \"OBJECTID\""));
        assert_eq!(HeaderMapping::load(&path).unwrap(), m);
    }

    #[test]
    fn invalid_mapping_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let err = HeaderMapping::load(&path).unwrap_err();
        assert!(matches!(err, GeoCardsError::InvalidMapping { .. }));
    }

    #[test]
    fn line_prompter_accepts_number_name_and_blank() {
        let candidates = names(&["ID", "Lon"]);

        let p = LinePrompter::new(Cursor::new("2\n"), Vec::new());
        assert_eq!(p.choose_column("x", &candidates), Some("Lon".into()));

        let p = LinePrompter::new(Cursor::new("ID\n"), Vec::new());
        assert_eq!(p.choose_column("OBJECTID", &candidates), Some("ID".into()));

        let p = LinePrompter::new(Cursor::new("\n"), Vec::new());
        assert_eq!(p.choose_column("OBJECTID", &candidates), None);

        let p = LinePrompter::new(Cursor::new(""), Vec::new());
        assert_eq!(p.choose_column("OBJECTID", &candidates), None);
    }

    #[test]
    fn line_prompter_retries_bad_answers() {
        let candidates = names(&["ID"]);
        let p = LinePrompter::new(Cursor::new("9\nnope\n1\n"), Vec::new());
        assert_eq!(p.choose_column("OBJECTID", &candidates), Some("ID".into()));

        let p = LinePrompter::new(Cursor::new("9\n9\n9\n1\n"), Vec::new());
        assert_eq!(p.choose_column("OBJECTID", &candidates), None);
    }

    #[test]
    fn missing_headers_write_template_and_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut headers = full_headers();
        headers.retain(|h| h != "OBJECTID");
        let mut table = Table::new(headers, vec![]);
        let template = dir.path().join("template_input.csv");
        let save = dir.path().join("mapping.json");

        let err = reconcile_table(
            &mut table,
            &ReconcileOptions {
                mapping: None,
                mapping_save_path: &save,
                template_table: &template,
                prompter: None,
            },
        )
        .unwrap_err();

        match err {
            GeoCardsError::MissingHeaders { missing, template: t } => {
                assert_eq!(missing, vec!["OBJECTID"]);
                assert_eq!(t, template);
            }
            other => panic!("unexpected error: {other}"),
        }
        let written = Table::read_csv(&template).unwrap();
        assert_eq!(written.headers(), full_headers().as_slice());
        assert!(written.is_empty());
        assert!(!save.exists());
    }

    #[test]
    fn prompter_corrections_are_saved_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut headers = full_headers();
        headers[0] = "Record".into();
        let template = dir.path().join("template_input.csv");
        let save = dir.path().join("mapping.json");

        let prompter = LinePrompter::new(Cursor::new("Record\n"), Vec::new());
        let mut table = Table::new(headers.clone(), vec![]);
        let map = reconcile_table(
            &mut table,
            &ReconcileOptions {
                mapping: None,
                mapping_save_path: &save,
                template_table: &template,
                prompter: Some(&prompter),
            },
        )
        .unwrap();
        assert!(map.is_complete());
        assert_eq!(table.headers()[0], "OBJECTID");
        assert!(!template.exists());

        // Second run: no prompter, mapping file supplies the rename.
        let mut table = Table::new(headers, vec![]);
        reconcile_table(
            &mut table,
            &ReconcileOptions {
                mapping: Some(&save),
                mapping_save_path: &save,
                template_table: &template,
                prompter: None,
            },
        )
        .unwrap();
        assert_eq!(table.headers()[0], "OBJECTID");
    }
}
