//! Link building: one satellite-view map URL per submission.
//!
//! Coordinates arrive as text. They are parsed to `f64` only to prove they
//! are numbers; the URL then uses Rust's shortest round-trip formatting, so
//! `44.9736` stays `44.9736`.

use crate::error::GeoCardsError;
use crate::pipeline::headers::CanonicalField;
use crate::pipeline::input;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Map service endpoint.
pub const MAP_BASE_URL: &str = "https://www.google.com/maps";

/// Column appended to the table with each row's URL.
pub const LINK_COLUMN: &str = "WebLink";

/// Build the map URL for a point: satellite layer (`t=k`) at `zoom`.
///
/// ```rust
/// use geocards::pipeline::links::build_map_link;
///
/// assert_eq!(
///     build_map_link(44.9736, -93.4983, 18),
///     "https://www.google.com/maps?q=44.9736,-93.4983&t=k&z=18"
/// );
/// ```
pub fn build_map_link(lat: f64, lon: f64, zoom: u32) -> String {
    format!("{MAP_BASE_URL}?q={lat},{lon}&t=k&z={zoom}")
}

/// Parse one coordinate cell. `row` is 1-indexed for messages.
pub fn parse_coordinate(row: usize, column: &str, value: &str) -> Result<f64, GeoCardsError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeoCardsError::InvalidCoordinate {
            row,
            column: column.to_string(),
            value: value.to_string(),
        })
}

/// Append (or overwrite) the [`LINK_COLUMN`] using the `x`/`y` columns.
///
/// Returns the links in row order.
pub fn add_link_column(table: &mut Table, zoom: u32) -> Result<Vec<String>, GeoCardsError> {
    let x = CanonicalField::X.name();
    let y = CanonicalField::Y.name();
    for column in [x, y] {
        if table.column_index(column).is_none() {
            return Err(GeoCardsError::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    let links = (0..table.len())
        .map(|i| {
            let lon = parse_coordinate(i + 1, x, table.cell(i, x).unwrap_or_default())?;
            let lat = parse_coordinate(i + 1, y, table.cell(i, y).unwrap_or_default())?;
            Ok(build_map_link(lat, lon, zoom))
        })
        .collect::<Result<Vec<_>, GeoCardsError>>()?;

    table.set_column(LINK_COLUMN, links.clone());
    Ok(links)
}

/// Persist a table carrying the [`LINK_COLUMN`], creating parent directories.
pub fn write_links_table(table: &Table, path: &Path) -> Result<(), GeoCardsError> {
    table.write_csv(path)?;
    info!("Generated {} web links → {}", table.len(), path.display());
    Ok(())
}

/// Standalone link stage: read `input`, add links, write the result.
///
/// `output` defaults to `<stem>_with_links.<ext>` beside the input.
pub fn process_table(
    input_path: &Path,
    output: Option<&Path>,
    zoom: u32,
) -> Result<PathBuf, GeoCardsError> {
    let mut table = input::resolve_input(input_path)?;
    add_link_column(&mut table, zoom)?;

    let output = output.map(Path::to_path_buf).unwrap_or_else(|| {
        input_path.with_file_name(crate::config::links_file_name(input_path))
    });
    write_links_table(&table, &output)?;
    Ok(output)
}

/// One validated input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub name: String,
    pub organization: String,
    pub description: String,
    pub feasibility: String,
    pub opportunities: String,
    pub challenges: String,
    pub funders: String,
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
    pub link: String,
}

/// Validate every row of a canonicalised table and build its link.
///
/// Identifiers must be non-empty and unique (they name the output files);
/// coordinates must be finite numbers.
pub fn submissions(table: &Table, zoom: u32) -> Result<Vec<Submission>, GeoCardsError> {
    for field in CanonicalField::ALL {
        if table.column_index(field.name()).is_none() {
            return Err(GeoCardsError::MissingColumn {
                column: field.name().to_string(),
            });
        }
    }

    let text = |row: usize, field: CanonicalField| -> String {
        table.cell(row, field.name()).unwrap_or_default().to_string()
    };

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(table.len());

    for i in 0..table.len() {
        let row = i + 1;
        let id = text(i, CanonicalField::ObjectId).trim().to_string();
        if id.is_empty() {
            return Err(GeoCardsError::EmptyIdentifier {
                row,
                column: CanonicalField::ObjectId.name().to_string(),
            });
        }
        if !is_file_safe(&id) {
            return Err(GeoCardsError::UnsafeIdentifier { row, id });
        }
        if let Some(&first_row) = seen.get(&id) {
            return Err(GeoCardsError::DuplicateIdentifier { row, first_row, id });
        }
        seen.insert(id.clone(), row);

        let x = parse_coordinate(row, CanonicalField::X.name(), &text(i, CanonicalField::X))?;
        let y = parse_coordinate(row, CanonicalField::Y.name(), &text(i, CanonicalField::Y))?;

        out.push(Submission {
            link: build_map_link(y, x, zoom),
            id,
            name: text(i, CanonicalField::Name),
            organization: text(i, CanonicalField::Organization),
            description: text(i, CanonicalField::Description),
            feasibility: text(i, CanonicalField::Feasibility),
            opportunities: text(i, CanonicalField::Opportunities),
            challenges: text(i, CanonicalField::Challenges),
            funders: text(i, CanonicalField::Funders),
            x,
            y,
        });
    }

    Ok(out)
}

/// Identifiers end up in `qr_<id>.png` and `card_<id>.md`; they must stay a
/// single path component.
fn is_file_safe(id: &str) -> bool {
    !id.contains("..") && !id.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}
