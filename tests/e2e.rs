//! End-to-end tests against the real PDF toolchain.
//!
//! These run pandoc and/or a LaTeX engine, so they are gated behind the
//! `E2E_ENABLED` environment variable and skip when the tools are missing.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use geocards::pipeline::compile::{CompilerBackend, LatexEngine, Pandoc};
use geocards::pipeline::headers::CanonicalField;
use geocards::{generate, CompileOutcome, GenerationConfig, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set *and* `$program` is on PATH.
macro_rules! e2e_skip_unless_ready {
    ($program:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if which::which($program).is_err() {
            println!("SKIP — '{}' not found on PATH", $program);
            return;
        }
    }};
}

/// Route library logs through the test harness; `RUST_LOG=debug` shows tool output.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_submissions(dir: &Path) -> PathBuf {
    let path = dir.join("submissions.csv");
    let headers = CanonicalField::all_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows = [("1", "44.9736", "-93.4983"), ("2", "44.98", "-93.5")]
        .iter()
        .map(|(id, lat, lon)| {
            vec![
                id.to_string(),
                "Ada Lovelace".into(),
                "Parks & Rec".into(),
                "Restore 40% of the wetland".into(),
                "Yes".into(),
                "Volunteers".into(),
                "Permits_and_fees".into(),
                "County".into(),
                lon.to_string(),
                lat.to_string(),
            ]
        })
        .collect();
    Table::new(headers, rows).write_csv(&path).unwrap();
    path
}

fn assert_pdf(path: &Path) {
    let bytes = std::fs::read(path).unwrap();
    assert!(bytes.starts_with(b"%PDF"), "not a PDF: {}", path.display());
}

fn run_with(backend: Arc<dyn CompilerBackend>) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let config = GenerationConfig::builder()
        .input(&input)
        .output_dir(dir.path().join("output"))
        .qr_dir(dir.path().join("qr_codes"))
        .backends(vec![backend])
        .build()
        .unwrap();

    let out = generate(&config).unwrap();
    let pdf = out.pdf().expect("PDF produced").clone();
    assert_pdf(&pdf);
    assert!(out.document.tex.is_file());
    assert!(matches!(out.document.outcome, CompileOutcome::Compiled { .. }));
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn xelatex_builds_the_card_pdf() {
    e2e_skip_unless_ready!("xelatex");
    run_with(Arc::new(LatexEngine::new("xelatex")));
}

#[test]
fn pandoc_builds_the_card_pdf() {
    e2e_skip_unless_ready!("pandoc");
    e2e_skip_unless_ready!("xelatex");
    run_with(Arc::new(Pandoc::new("xelatex")));
}

#[test]
fn default_backends_fall_back_to_whatever_is_installed() {
    e2e_skip_unless_ready!("xelatex");
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let input = write_submissions(dir.path());
    let config = GenerationConfig::builder()
        .input(&input)
        .output_dir(dir.path().join("output"))
        .qr_dir(dir.path().join("qr_codes"))
        .build()
        .unwrap();

    let out = generate(&config).unwrap();
    match &out.document.outcome {
        CompileOutcome::Compiled { backend, pdf } => {
            println!("compiled with {backend}");
            assert_pdf(pdf);
        }
        CompileOutcome::Skipped => panic!("compilation was not attempted"),
    }
}
