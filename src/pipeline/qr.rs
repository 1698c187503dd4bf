//! QR rendering: URL → black-on-white PNG.
//!
//! Error correction is fixed at Medium (~15% recoverable), enough for a
//! printed card that gets scuffed, while keeping the symbol small for a
//! 60-character map URL. The quiet zone is the standard four modules; the
//! module (box) size in pixels is the only knob.

use crate::error::GeoCardsError;
use crate::output::QrArtifact;
use crate::pipeline::links::Submission;
use crate::progress::{ProgressCallback, Stage};
use crate::table::Table;
use image::{GrayImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::path::Path;
use tracing::{debug, info};

/// Quiet-zone width in modules, as rendered by the encoder.
pub const BORDER_MODULES: u32 = 4;

/// File name of the metadata table written next to the images.
pub const METADATA_FILE: &str = "qr_metadata.csv";

/// Rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    /// Pixels per module. Default: 10.
    pub box_size: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            box_size: crate::config::DEFAULT_BOX_SIZE,
        }
    }
}

/// Deterministic file name for a row's QR image.
pub fn qr_file_name(id: &str) -> String {
    format!("qr_{id}.png")
}

/// Encode `data` into an 8-bit grayscale QR image.
///
/// Same input and options always give the same pixels.
pub fn render_qr(data: &str, options: QrOptions) -> Result<GrayImage, GeoCardsError> {
    if options.box_size == 0 {
        return Err(GeoCardsError::InvalidConfig(
            "QR box size must be ≥ 1".into(),
        ));
    }

    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M).map_err(|e| {
        GeoCardsError::InvalidConfig(format!("cannot encode {} bytes as QR: {e}", data.len()))
    })?;

    let image = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(options.box_size, options.box_size)
        .dark_color(Luma([0]))
        .light_color(Luma([255]))
        .build();

    debug!(
        "QR version {:?}: {} modules → {}x{} px",
        code.version(),
        code.width(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Render `data` and save it as PNG at `path`.
pub fn write_qr(data: &str, path: &Path, options: QrOptions) -> Result<(), GeoCardsError> {
    let image = render_qr(data, options)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| GeoCardsError::write(parent, e))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| GeoCardsError::ImageWriteFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    debug!("QR code saved to {}", path.display());
    Ok(())
}

/// Write one QR image per submission into `qr_dir`, plus [`METADATA_FILE`].
///
/// The metadata table has columns `id,url,filename` in input order.
pub fn render_all(
    submissions: &[Submission],
    qr_dir: &Path,
    options: QrOptions,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<QrArtifact>, GeoCardsError> {
    std::fs::create_dir_all(qr_dir).map_err(|e| GeoCardsError::write(qr_dir, e))?;
    let total = submissions.len();
    if let Some(cb) = progress {
        cb.on_stage_start(Stage::QrCodes, total);
    }

    let mut artifacts = Vec::with_capacity(total);
    for (i, sub) in submissions.iter().enumerate() {
        let filename = qr_file_name(&sub.id);
        let path = qr_dir.join(&filename);
        write_qr(&sub.link, &path, options)?;
        if let Some(cb) = progress {
            cb.on_row_complete(Stage::QrCodes, i + 1, total, &sub.id);
        }
        artifacts.push(QrArtifact {
            id: sub.id.clone(),
            url: sub.link.clone(),
            filename,
            path,
        });
    }

    write_metadata(&artifacts, &qr_dir.join(METADATA_FILE))?;
    info!("Generated {} QR codes in {}", artifacts.len(), qr_dir.display());
    Ok(artifacts)
}

/// Write the `id,url,filename` metadata table.
pub fn write_metadata(artifacts: &[QrArtifact], path: &Path) -> Result<(), GeoCardsError> {
    let table = Table::new(
        vec!["id".into(), "url".into(), "filename".into()],
        artifacts
            .iter()
            .map(|a| vec![a.id.clone(), a.url.clone(), a.filename.clone()])
            .collect(),
    );
    table.write_csv(path)
}
