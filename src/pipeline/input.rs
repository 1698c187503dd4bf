//! Input resolution: check the user-supplied table path and load it.
//!
//! Existence and read permission are checked before handing the path to the
//! CSV reader so callers get a specific error instead of a generic parse
//! failure.

use crate::error::GeoCardsError;
use crate::table::Table;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolve `path` to a readable file and parse it as a CSV table.
pub fn resolve_input(path: &Path) -> Result<Table, GeoCardsError> {
    let path = resolve_local(path)?;
    let table = Table::read_csv(&path)?;
    info!(
        "Loaded {} rows from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Check a local file exists and can be opened for reading.
pub fn resolve_local(path: &Path) -> Result<PathBuf, GeoCardsError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(GeoCardsError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(GeoCardsError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(GeoCardsError::FileNotFound { path });
        }
    }

    debug!("Resolved local file: {}", path.display());
    Ok(path)
}

/// Read a template file configured by path.
pub fn read_template(path: &Path) -> Result<String, GeoCardsError> {
    if !path.is_file() {
        return Err(GeoCardsError::TemplateNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            GeoCardsError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            GeoCardsError::TemplateNotFound {
                path: path.to_path_buf(),
            }
        }
    })
}
