//! In-memory CSV table shared by every pipeline stage.
//!
//! The input spreadsheet is small (one row per submission), so the whole file
//! is read up front into a header row plus string records. Stages never care
//! about cell types beyond the two coordinate columns, which
//! [`crate::pipeline::links`] parses on demand.

use crate::error::GeoCardsError;
use std::path::Path;
use tracing::debug;

/// A header row and its records, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from headers and rows.
    ///
    /// Short rows are padded with empty cells so every row has one cell per
    /// header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width.max(r.len()), String::new());
                r
            })
            .collect();
        Self { headers, rows }
    }

    /// Read a CSV file. A UTF-8 byte-order mark on the first header is dropped.
    pub fn read_csv(path: &Path) -> Result<Self, GeoCardsError> {
        let malformed = |detail: String| GeoCardsError::MalformedTable {
            path: path.to_path_buf(),
            detail,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| malformed(e.to_string()))?;

        let mut headers: Vec<String> = reader
            .headers()
            .map_err(|e| malformed(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        if let Some(first) = headers.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{FEFF}') {
                *first = stripped.to_string();
            }
        }
        if headers.is_empty() {
            return Err(malformed("file has no header row".into()));
        }

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| malformed(format!("record {}: {}", i + 1, e)))?;
            if record.len() > headers.len() {
                return Err(malformed(format!(
                    "record {} has {} fields but the header has {}",
                    i + 1,
                    record.len(),
                    headers.len()
                )));
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        debug!(
            "Read {} rows × {} columns from {}",
            rows.len(),
            headers.len(),
            path.display()
        );
        Ok(Self::new(headers, rows))
    }

    /// Write the table as CSV, creating parent directories as needed.
    pub fn write_csv(&self, path: &Path) -> Result<(), GeoCardsError> {
        write_records(path, &self.headers, &self.rows)
    }

    /// Write a header-only CSV: the blank template handed back to operators.
    pub fn write_header_only(path: &Path, headers: &[&str]) -> Result<(), GeoCardsError> {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        write_records(path, &headers, &[])
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column named exactly `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `row` in the column named `name`, if both exist.
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    /// Rename one column. Returns `false` when `from` is not a header.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(i) => {
                self.headers[i] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Append a column, or overwrite it when a column of that name exists.
    ///
    /// `values` must hold one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(col) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }
}

fn write_records(
    path: &Path,
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<(), GeoCardsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| GeoCardsError::write(parent, e))?;
    }

    let to_io = |e: csv::Error| GeoCardsError::write(path, std::io::Error::other(e.to_string()));

    let mut writer = csv::Writer::from_path(path).map_err(to_io)?;
    writer.write_record(headers).map_err(to_io)?;
    for row in rows {
        writer.write_record(row).map_err(to_io)?;
    }
    writer.flush().map_err(|e| GeoCardsError::write(path, e))?;
    Ok(())
}
