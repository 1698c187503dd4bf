//! Progress-callback trait for per-stage and per-row pipeline events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the table. The CLI uses this to
//! drive an `indicatif` progress bar; a library caller can forward the events
//! anywhere without the library knowing how.
//!
//! # Example
//!
//! ```rust
//! use geocards::{GenerationProgressCallback, GenerationConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rows: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_row_complete(&self, stage: Stage, _row: usize, _total: usize, id: &str) {
//!         self.rows.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage}: {id}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rows: AtomicUsize::new(0) });
//!
//! let config = GenerationConfig::builder()
//!     .input("submissions.csv")
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pipeline stage reported to the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Headers,
    Links,
    QrCodes,
    Cards,
    Document,
    Compile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Headers => "headers",
            Stage::Links => "links",
            Stage::QrCodes => "qr codes",
            Stage::Cards => "cards",
            Stage::Document => "document",
            Stage::Compile => "compile",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as it processes each stage and row.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The pipeline is sequential; `Send + Sync` is
/// required only so configs can be shared across threads by the caller.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once the input table is loaded and validated.
    ///
    /// # Arguments
    /// * `total_rows` — number of submissions that will be processed
    fn on_run_start(&self, total_rows: usize) {
        let _ = total_rows;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage, total: usize) {
        let _ = (stage, total);
    }

    /// Called after a row's artifact for `stage` is written.
    ///
    /// # Arguments
    /// * `row`   — 1-indexed row number
    /// * `total` — rows in the stage
    /// * `id`    — the row identifier
    fn on_row_complete(&self, stage: Stage, row: usize, total: usize, id: &str) {
        let _ = (stage, row, total, id);
    }

    /// Called for each non-fatal row problem.
    fn on_row_warning(&self, id: &str, message: &str) {
        let _ = (id, message);
    }

    /// Called when the compiler backend list starts a new attempt.
    fn on_compile_attempt(&self, backend: &str) {
        let _ = backend;
    }

    /// Called once after the last stage.
    ///
    /// # Arguments
    /// * `total_rows`    — rows processed
    /// * `warning_count` — row warnings collected
    fn on_run_complete(&self, total_rows: usize, warning_count: usize) {
        let _ = (total_rows, warning_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        stages: AtomicUsize,
        rows: AtomicUsize,
        warnings: AtomicUsize,
        finished_rows: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: Stage, _total: usize) {
            self.stages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_complete(&self, _stage: Stage, _row: usize, _total: usize, _id: &str) {
            self.rows.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_warning(&self, _id: &str, _message: &str) {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, total_rows: usize, _warning_count: usize) {
            self.finished_rows.store(total_rows, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_stage_start(Stage::QrCodes, 3);
        cb.on_row_complete(Stage::QrCodes, 1, 3, "1");
        cb.on_row_warning("2", "qr missing");
        cb.on_compile_attempt("pandoc");
        cb.on_run_complete(3, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage_start(Stage::Cards, 2);
        tracker.on_row_complete(Stage::Cards, 1, 2, "a");
        tracker.on_row_complete(Stage::Cards, 2, 2, "b");
        tracker.on_row_warning("b", "missing image");
        tracker.on_run_complete(2, 1);

        assert_eq!(tracker.stages.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.rows.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.warnings.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.finished_rows.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::QrCodes.to_string(), "qr codes");
        assert_eq!(Stage::Compile.to_string(), "compile");
    }
}
