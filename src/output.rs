//! Result types returned by a pipeline run.

use crate::error::RowWarning;
use crate::pipeline::headers::HeaderMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One rendered QR image and its metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrArtifact {
    pub id: String,
    /// The encoded URL.
    pub url: String,
    /// Bare file name, as recorded in the metadata table.
    pub filename: String,
    /// Full path of the written image.
    pub path: PathBuf,
}

/// One composed card file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardArtifact {
    pub id: String,
    pub path: PathBuf,
}

/// What happened to the intermediate document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileOutcome {
    /// A backend produced the PDF.
    Compiled { backend: String, pdf: PathBuf },
    /// Compilation was bypassed on request.
    Skipped,
}

/// Output of [`crate::generate::compile_cards`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutput {
    /// The rendered LaTeX file; always kept.
    pub tex: PathBuf,
    pub cards: usize,
    pub outcome: CompileOutcome,
    pub warnings: Vec<RowWarning>,
}

/// Timing and counts for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub rows: usize,
    pub qr_codes: usize,
    pub cards: usize,
    pub warnings: usize,
    pub qr_duration_ms: u64,
    pub compile_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub header_map: HeaderMap,
    /// Input table plus the link column.
    pub links_table: PathBuf,
    pub qr_codes: Vec<QrArtifact>,
    pub qr_metadata: PathBuf,
    pub cards_dir: PathBuf,
    pub cards: Vec<CardArtifact>,
    pub document: DocumentOutput,
    pub warnings: Vec<RowWarning>,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// The compiled PDF, when compilation ran and succeeded.
    pub fn pdf(&self) -> Option<&PathBuf> {
        match &self.document.outcome {
            CompileOutcome::Compiled { pdf, .. } => Some(pdf),
            CompileOutcome::Skipped => None,
        }
    }
}
