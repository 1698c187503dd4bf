//! PDF compilation through external tools.
//!
//! ## Why a backend list?
//!
//! Print shops and laptops differ in what is installed. Pandoc gives the
//! nicest result when present; a bare TeX distribution is the common
//! fallback. Each backend is a [`CompilerBackend`], tried in order until one
//! leaves a PDF on disk. Every failure is kept so the final error can say
//! what was tried and why each attempt failed.

use crate::error::CompileError;
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lines of tool stderr kept in a [`CompileError::ToolFailed`].
const STDERR_TAIL_LINES: usize = 20;

/// One way of turning the intermediate `.tex` into a PDF.
pub trait CompilerBackend: Send + Sync {
    /// Short label used in logs and errors.
    fn name(&self) -> &str;

    /// Executable this backend needs on `PATH`.
    fn program(&self) -> &str;

    /// Whether [`Self::program`] can be found.
    fn is_available(&self) -> bool {
        which::which(self.program()).is_ok()
    }

    /// Compile `tex` so that a PDF ends up at `pdf`.
    fn compile(&self, tex: &Path, pdf: &Path) -> Result<PathBuf, CompileError>;
}

// ── Pandoc ───────────────────────────────────────────────────────────────────

/// `pandoc <tex> -o <pdf> --pdf-engine=<engine>`
#[derive(Debug, Clone)]
pub struct Pandoc {
    pub engine: String,
}

impl Pandoc {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
        }
    }
}

impl CompilerBackend for Pandoc {
    fn name(&self) -> &str {
        "pandoc"
    }

    fn program(&self) -> &str {
        "pandoc"
    }

    fn compile(&self, tex: &Path, pdf: &Path) -> Result<PathBuf, CompileError> {
        let mut cmd = Command::new(self.program());
        cmd.arg(tex)
            .arg("-o")
            .arg(pdf)
            .arg(format!("--pdf-engine={}", self.engine));
        run(self.name(), cmd)?;
        expect_artifact(self.name(), pdf)
    }
}

// ── LaTeX engine ─────────────────────────────────────────────────────────────

/// Runs a LaTeX engine directly and moves its PDF to the requested path.
#[derive(Debug, Clone)]
pub struct LatexEngine {
    pub engine: String,
}

impl LatexEngine {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
        }
    }
}

impl CompilerBackend for LatexEngine {
    fn name(&self) -> &str {
        &self.engine
    }

    fn program(&self) -> &str {
        &self.engine
    }

    fn compile(&self, tex: &Path, pdf: &Path) -> Result<PathBuf, CompileError> {
        let out_dir = tex
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut cmd = Command::new(self.program());
        cmd.arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-output-directory")
            .arg(out_dir)
            .arg(tex);
        run(self.name(), cmd)?;

        let produced = expect_artifact(self.name(), &engine_output(tex, out_dir))?;
        if produced != pdf {
            move_file(&produced, pdf).map_err(|e| CompileError::Io {
                backend: self.name().to_string(),
                detail: format!("moving {} to {}: {e}", produced.display(), pdf.display()),
            })?;
        }
        expect_artifact(self.name(), pdf)
    }
}

/// Pandoc first, then the bare engine.
pub fn default_backends(engine: &str) -> Vec<Arc<dyn CompilerBackend>> {
    vec![
        Arc::new(Pandoc::new(engine)),
        Arc::new(LatexEngine::new(engine)),
    ]
}

// ── Fallback ─────────────────────────────────────────────────────────────────

/// Try each backend in order. Returns the winning backend's name and the PDF
/// path, or every attempt's error.
///
/// Any file at `pdf` is removed before each attempt so a PDF left by an
/// earlier run is never mistaken for success.
pub fn compile_with_fallback(
    backends: &[Arc<dyn CompilerBackend>],
    tex: &Path,
    pdf: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<(String, PathBuf), Vec<CompileError>> {
    let mut attempts = Vec::with_capacity(backends.len());

    for backend in backends {
        let name = backend.name().to_string();
        if let Some(cb) = progress {
            cb.on_compile_attempt(&name);
        }

        if !backend.is_available() {
            debug!("{name}: '{}' not on PATH, skipping", backend.program());
            attempts.push(CompileError::ToolUnavailable {
                backend: name,
                program: backend.program().to_string(),
            });
            continue;
        }

        if pdf.exists() {
            if let Err(e) = std::fs::remove_file(pdf) {
                attempts.push(CompileError::Io {
                    backend: name,
                    detail: format!("removing stale {}: {e}", pdf.display()),
                });
                continue;
            }
        }

        info!("Compiling {} with {name}", tex.display());
        match backend.compile(tex, pdf) {
            Ok(path) if path.is_file() => {
                info!("PDF created with {name}: {}", path.display());
                return Ok((name, path));
            }
            Ok(path) => {
                warn!("{name} reported success but {} is missing", path.display());
                attempts.push(CompileError::NoArtifact {
                    backend: name,
                    expected: path,
                });
            }
            Err(e) => {
                warn!("{e}");
                attempts.push(e);
            }
        }
    }

    Err(attempts)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn run(backend: &str, mut cmd: Command) -> Result<(), CompileError> {
    debug!("Running {cmd:?}");
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CompileError::ToolUnavailable {
                backend: backend.to_string(),
                program: cmd.get_program().to_string_lossy().into_owned(),
            },
            _ => CompileError::Io {
                backend: backend.to_string(),
                detail: e.to_string(),
            },
        })?;

    if output.status.success() {
        return Ok(());
    }

    // LaTeX engines report errors on stdout.
    let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
    if text.trim().is_empty() {
        text = String::from_utf8_lossy(&output.stdout).into_owned();
    }
    Err(CompileError::ToolFailed {
        backend: backend.to_string(),
        status: output.status.to_string(),
        stderr: tail(&text, STDERR_TAIL_LINES),
    })
}

fn expect_artifact(backend: &str, path: &Path) -> Result<PathBuf, CompileError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(CompileError::NoArtifact {
            backend: backend.to_string(),
            expected: path.to_path_buf(),
        })
    }
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    // rename fails across filesystems
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Where a LaTeX engine writes the PDF for `tex`: the full stem, dots
/// included, plus `.pdf`.
fn engine_output(tex: &Path, out_dir: &Path) -> PathBuf {
    let mut name = tex.file_stem().unwrap_or_default().to_os_string();
    name.push(".pdf");
    out_dir.join(name)
}
