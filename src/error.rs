//! Error types for the geocards library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`GeoCardsError`] — **Fatal**: a stage cannot proceed at all (input
//!   table missing or malformed, template absent, every compiler backend
//!   exhausted). Returned as `Err(GeoCardsError)` from the stage functions
//!   and from [`crate::generate::generate`].
//!
//! * [`RowWarning`] — **Non-fatal**: one row degraded (its QR image vanished
//!   before compilation) but the batch carries on. Collected in
//!   [`crate::output::GenerationOutput::warnings`].
//!
//! Compiler backends report their own [`CompileError`]; the orchestrator
//! only escalates them to [`GeoCardsError::CompilationFailed`] once the whole
//! fallback list has been tried.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the geocards library.
#[derive(Debug, Error)]
pub enum GeoCardsError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input table was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A configured template file does not exist and no default applies.
    #[error("Template not found: '{path}'\nCreate it, or omit the option to use the built-in template.")]
    TemplateNotFound { path: PathBuf },

    /// The CSV could not be parsed.
    #[error("Could not parse table '{path}': {detail}")]
    MalformedTable { path: PathBuf, detail: String },

    /// A card file exists but could not be read (for example, not UTF-8).
    #[error("Could not read card '{path}': {source}")]
    UnreadableCard {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reconciliation left canonical columns unmatched.
    #[error(
        "Input is missing required headers: {}\nA blank template with the expected headers was written to '{}'",
        .missing.join(", "),
        .template.display()
    )]
    MissingHeaders {
        missing: Vec<String>,
        template: PathBuf,
    },

    /// A stage needed a column the table does not carry.
    #[error("Input must contain a '{column}' column")]
    MissingColumn { column: String },

    /// A coordinate cell is not a finite number.
    #[error("Row {row}: column '{column}' must be numeric, got {value:?}")]
    InvalidCoordinate {
        row: usize,
        column: String,
        value: String,
    },

    /// A row has a blank identifier.
    #[error("Row {row}: identifier column '{column}' is empty")]
    EmptyIdentifier { row: usize, column: String },

    /// An identifier cannot be used as part of a file name.
    #[error("Row {row}: identifier {id:?} cannot be used in a file name (no path separators, '..' or control characters)")]
    UnsafeIdentifier { row: usize, id: String },

    /// Two rows share an identifier; their output files would collide.
    #[error("Row {row}: identifier '{id}' already used by row {first_row}")]
    DuplicateIdentifier {
        row: usize,
        first_row: usize,
        id: String,
    },

    /// The header-mapping file exists but is not a JSON string map.
    #[error("Invalid header mapping '{path}': {detail}")]
    InvalidMapping { path: PathBuf, detail: String },

    // ── Template errors ───────────────────────────────────────────────────
    /// Strict placeholder policy hit a token with no matching field.
    #[error("Template uses unknown placeholder '{{{{{name}}}}}'")]
    UnknownPlaceholder { name: String },

    /// The document template failed to parse or render.
    #[error("Document template error: {0}")]
    TemplateRender(String),

    // ── External tool errors ──────────────────────────────────────────────
    /// Every compiler backend failed; the intermediate document is kept.
    #[error(
        "PDF compilation failed; intermediate document kept at '{}'\n{}",
        .tex.display(),
        .attempts.iter().map(|e| format!("  • {e}")).collect::<Vec<_>>().join("\n")
    )]
    CompilationFailed {
        tex: PathBuf,
        attempts: Vec<CompileError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The QR image encoder failed.
    #[error("Failed to write QR image '{path}': {detail}")]
    ImageWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GeoCardsError {
    /// Shorthand for the ubiquitous "could not write this path" case.
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GeoCardsError::OutputWriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// Why a single compiler backend did not produce a PDF.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum CompileError {
    /// The backend's program is not on `PATH`.
    #[error("{backend}: '{program}' not found on PATH")]
    ToolUnavailable { backend: String, program: String },

    /// The program ran and exited unsuccessfully.
    #[error("{backend}: exited with {status}: {stderr}")]
    ToolFailed {
        backend: String,
        status: String,
        stderr: String,
    },

    /// The program exited cleanly but no PDF appeared.
    #[error("{backend}: finished but produced no file at '{}'", .expected.display())]
    NoArtifact { backend: String, expected: PathBuf },

    /// Spawning or file handling around the program failed.
    #[error("{backend}: {detail}")]
    Io { backend: String, detail: String },
}

/// A non-fatal problem with one row.
///
/// The batch continues; the CLI prints these after the summary.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RowWarning {
    /// The card references a QR image that is not on disk; the bare file
    /// name was substituted in the document.
    #[error("Card '{id}': QR image '{}' not found, using bare file name", .expected.display())]
    MissingQrImage { id: String, expected: PathBuf },
}
