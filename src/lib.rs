//! # geocards
//!
//! Turn a spreadsheet of geo-tagged project submissions into printable
//! cards, each with a QR code that opens the project's location on a map.
//!
//! ## Why this crate?
//!
//! Workshop organisers collect project ideas through a survey tool that pins
//! each idea on a map. Handing participants a stack of cards, one per idea,
//! works better than a projector, but building those cards by hand means
//! copying coordinates into a QR generator and text into a word processor
//! for every row. This crate does the whole run from the CSV export.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CSV
//!  │
//!  ├─ 1. Input     check the path, parse the table
//!  ├─ 2. Headers   match columns to canonical fields (exact → case → trim)
//!  ├─ 3. Links     satellite map URL per row, written as a WebLink column
//!  ├─ 4. QR        one PNG per row + qr_metadata.csv
//!  ├─ 5. Cards     fill the card template per row → card_<id>.md
//!  └─ 6. Document  cards → LaTeX → PDF (pandoc, then xelatex)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geocards::{generate, GenerationConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GenerationConfig::builder()
//!         .input("survey_export.csv")
//!         .output_dir("output")
//!         .build()?;
//!     let output = generate(&config)?;
//!     eprintln!("{} cards", output.stats.cards);
//!     if let Some(pdf) = output.pdf() {
//!         eprintln!("PDF: {}", pdf.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `geocards` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! geocards = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! PDF output needs `pandoc` or a LaTeX engine (`xelatex` by default) on
//! `PATH`. Without either, set `skip_compile` and compile the `.tex` file
//! elsewhere.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod table;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder};
pub use error::{CompileError, GeoCardsError, RowWarning};
pub use generate::{compile_cards, generate, DocumentOptions};
pub use output::{
    CardArtifact, CompileOutcome, DocumentOutput, GenerationOutput, GenerationStats, QrArtifact,
};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use table::Table;
