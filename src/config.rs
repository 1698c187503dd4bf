//! Configuration types for a card-generation run.
//!
//! Every knob lives in [`GenerationConfig`], built via its
//! [`GenerationConfigBuilder`]. Paths default to the layout the CLI uses
//! (`output/`, `qr_codes/`), so a library caller usually only sets the input
//! table and whatever it wants to override.

use crate::error::GeoCardsError;
use crate::pipeline::compile::CompilerBackend;
use crate::pipeline::headers::MappingPrompter;
use crate::pipeline::template::UnknownPlaceholder;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default Google Maps zoom level.
pub const DEFAULT_ZOOM: u32 = 18;

/// Default QR module size in pixels.
pub const DEFAULT_BOX_SIZE: u32 = 10;

/// Default LaTeX engine for both compiler backends.
pub const DEFAULT_LATEX_ENGINE: &str = "xelatex";

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use geocards::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .input("submissions.csv")
///     .zoom(16)
///     .skip_compile(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.cards_dir(), std::path::Path::new("output/cards"));
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Input CSV of submissions.
    pub input: PathBuf,

    /// Card markdown template. If None, uses [`crate::templates::DEFAULT_CARD_TEMPLATE`].
    pub card_template: Option<PathBuf>,

    /// Document template. If None, uses [`crate::templates::DEFAULT_DOCUMENT_TEMPLATE`].
    ///
    /// A path that does not exist yet is created with the built-in template
    /// so operators get a starting point to edit.
    pub document_template: Option<PathBuf>,

    /// Directory for the links table, cards and document. Default: `output`.
    pub output_dir: PathBuf,

    /// Directory for QR images and their metadata table. Default: `qr_codes`.
    pub qr_dir: PathBuf,

    /// Final PDF path. If None, `<output_dir>/printable_cards.pdf`.
    pub output_pdf: Option<PathBuf>,

    /// Where the blank header template goes when reconciliation fails.
    /// If None, `<output_dir>/template_input.csv`.
    pub template_table: Option<PathBuf>,

    /// Map zoom level. Default: 18. Not range-checked.
    pub zoom: u32,

    /// QR module size in pixels. Default: 10.
    pub box_size: u32,

    /// Emit the intermediate `.tex` only; never run a compiler. Default: false.
    pub skip_compile: bool,

    /// Header-mapping JSON file. Loaded at start when it exists and written
    /// after interactive corrections.
    pub mapping: Option<PathBuf>,

    /// Operator prompt used when headers are missing. None means fail
    /// without asking.
    pub prompter: Option<Arc<dyn MappingPrompter>>,

    /// What to do with template tokens that name no known field.
    /// Default: [`UnknownPlaceholder::PassThrough`].
    pub unknown_placeholders: UnknownPlaceholder,

    /// LaTeX engine used by both default backends. Default: `xelatex`.
    pub latex_engine: String,

    /// Pre-constructed backend list. Takes precedence over the defaults
    /// derived from `latex_engine`.
    pub backends: Option<Vec<Arc<dyn CompilerBackend>>>,

    /// Optional progress callback for per-row events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            card_template: None,
            document_template: None,
            output_dir: PathBuf::from("output"),
            qr_dir: PathBuf::from("qr_codes"),
            output_pdf: None,
            template_table: None,
            zoom: DEFAULT_ZOOM,
            box_size: DEFAULT_BOX_SIZE,
            skip_compile: false,
            mapping: None,
            prompter: None,
            unknown_placeholders: UnknownPlaceholder::default(),
            latex_engine: DEFAULT_LATEX_ENGINE.to_string(),
            backends: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("input", &self.input)
            .field("card_template", &self.card_template)
            .field("document_template", &self.document_template)
            .field("output_dir", &self.output_dir)
            .field("qr_dir", &self.qr_dir)
            .field("output_pdf", &self.output_pdf)
            .field("template_table", &self.template_table)
            .field("zoom", &self.zoom)
            .field("box_size", &self.box_size)
            .field("skip_compile", &self.skip_compile)
            .field("mapping", &self.mapping)
            .field("prompter", &self.prompter.as_ref().map(|_| "<dyn MappingPrompter>"))
            .field("unknown_placeholders", &self.unknown_placeholders)
            .field("latex_engine", &self.latex_engine)
            .field(
                "backends",
                &self
                    .backends
                    .as_ref()
                    .map(|b| b.iter().map(|x| x.name().to_string()).collect::<Vec<_>>()),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory holding one markdown file per card.
    pub fn cards_dir(&self) -> PathBuf {
        self.output_dir.join("cards")
    }

    /// Resolved final PDF path.
    pub fn output_pdf(&self) -> PathBuf {
        self.output_pdf
            .clone()
            .unwrap_or_else(|| self.output_dir.join("printable_cards.pdf"))
    }

    /// Resolved path for the blank header template.
    pub fn template_table(&self) -> PathBuf {
        self.template_table
            .clone()
            .unwrap_or_else(|| self.output_dir.join("template_input.csv"))
    }

    /// Where interactive corrections are saved.
    pub fn mapping_save_path(&self) -> PathBuf {
        self.mapping
            .clone()
            .unwrap_or_else(|| self.output_dir.join("header_mapping.json"))
    }

    /// Links table path: `<output_dir>/<input_stem>_with_links.<ext>`.
    pub fn links_table(&self) -> PathBuf {
        self.output_dir.join(links_file_name(&self.input))
    }
}

/// `<stem>_with_links.<ext>` for an input path, defaulting the extension to `csv`.
pub fn links_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let ext = input
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    format!("{stem}_with_links.{ext}")
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input = path.into();
        self
    }

    pub fn card_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.card_template = Some(path.into());
        self
    }

    pub fn document_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.document_template = Some(path.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn qr_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.qr_dir = dir.into();
        self
    }

    pub fn output_pdf(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_pdf = Some(path.into());
        self
    }

    pub fn template_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template_table = Some(path.into());
        self
    }

    pub fn zoom(mut self, zoom: u32) -> Self {
        self.config.zoom = zoom;
        self
    }

    pub fn box_size(mut self, px: u32) -> Self {
        self.config.box_size = px;
        self
    }

    pub fn skip_compile(mut self, v: bool) -> Self {
        self.config.skip_compile = v;
        self
    }

    pub fn mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mapping = Some(path.into());
        self
    }

    pub fn prompter(mut self, prompter: Arc<dyn MappingPrompter>) -> Self {
        self.config.prompter = Some(prompter);
        self
    }

    pub fn unknown_placeholders(mut self, policy: UnknownPlaceholder) -> Self {
        self.config.unknown_placeholders = policy;
        self
    }

    pub fn latex_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.latex_engine = engine.into();
        self
    }

    pub fn backends(mut self, backends: Vec<Arc<dyn CompilerBackend>>) -> Self {
        self.config.backends = Some(backends);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, GeoCardsError> {
        let c = &self.config;
        if c.input.as_os_str().is_empty() {
            return Err(GeoCardsError::InvalidConfig(
                "An input table is required".into(),
            ));
        }
        if c.box_size == 0 {
            return Err(GeoCardsError::InvalidConfig(
                "QR box size must be ≥ 1".into(),
            ));
        }
        if c.latex_engine.trim().is_empty() {
            return Err(GeoCardsError::InvalidConfig(
                "LaTeX engine name must not be empty".into(),
            ));
        }
        if matches!(c.backends, Some(ref b) if b.is_empty()) && !c.skip_compile {
            return Err(GeoCardsError::InvalidConfig(
                "At least one compiler backend is required unless compilation is skipped".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_cli_layout() {
        let c = GenerationConfig::builder().input("data.csv").build().unwrap();
        assert_eq!(c.zoom, 18);
        assert_eq!(c.box_size, 10);
        assert_eq!(c.output_pdf(), PathBuf::from("output/printable_cards.pdf"));
        assert_eq!(c.template_table(), PathBuf::from("output/template_input.csv"));
        assert_eq!(c.mapping_save_path(), PathBuf::from("output/header_mapping.json"));
        assert_eq!(c.links_table(), PathBuf::from("output/data_with_links.csv"));
        assert!(!c.skip_compile);
    }

    #[test]
    fn missing_input_rejected() {
        let err = GenerationConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("input"));
    }

    #[test]
    fn zero_box_size_rejected() {
        let err = GenerationConfig::builder()
            .input("a.csv")
            .box_size(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, GeoCardsError::InvalidConfig(_)));
    }

    #[test]
    fn empty_backend_list_needs_skip() {
        assert!(GenerationConfig::builder()
            .input("a.csv")
            .backends(vec![])
            .build()
            .is_err());
        assert!(GenerationConfig::builder()
            .input("a.csv")
            .backends(vec![])
            .skip_compile(true)
            .build()
            .is_ok());
    }

    #[test]
    fn links_file_name_without_extension() {
        assert_eq!(links_file_name(Path::new("dir/export")), "export_with_links.csv");
    }
}
