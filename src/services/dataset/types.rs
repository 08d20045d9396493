use chrono::NaiveDateTime;
use polars::prelude::DataType;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::error::AppError;
use super::utils::{format_float, parse_text_cell, DATETIME_FORMAT};

/// Number of sample values kept per column in the column stats view.
pub const SAMPLE_SIZE: usize = 3;

/// A single parsed cell, before its column has been classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    /// Text rendering of a typed value; `None` for a missing cell.
    pub fn display_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(format_float(*f)),
            Cell::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

/// One column of raw cells as read from an upload.
///
/// Every cell keeps the text it was read from next to its parsed value, so
/// a column that ends up classified as text holds exactly what was uploaded.
#[derive(Debug, Clone, Default)]
pub struct RawColumn {
    pub name: String,
    cells: Vec<Cell>,
    texts: Vec<Option<String>>,
}

impl RawColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn from_cells(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let mut column = Self::new(name);
        for cell in cells {
            column.push(cell);
        }
        column
    }

    /// Appends an already-typed value.
    pub fn push(&mut self, cell: Cell) {
        self.texts.push(cell.display_text());
        self.cells.push(cell);
    }

    /// Appends a textual value, parsed into its most specific type.
    pub fn push_text(&mut self, raw: &str) {
        let cell = parse_text_cell(raw);
        self.texts.push((cell != Cell::Empty).then(|| raw.to_string()));
        self.cells.push(cell);
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn texts(&self) -> &[Option<String>] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Closed set of column type tags reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Text,
    Boolean,
    Datetime,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Datetime => "datetime",
        }
    }

    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => ColumnType::Boolean,
            DataType::Datetime(_, _) | DataType::Date => ColumnType::Datetime,
            dt if dt.is_numeric() => ColumnType::Numeric,
            _ => ColumnType::Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Json,
}

impl FileFormat {
    /// Resolves the format from a file name extension. Uploads without a
    /// name are read as CSV.
    pub fn from_file_name(file_name: Option<&str>) -> Result<Self, AppError> {
        let Some(name) = file_name.filter(|n| !n.is_empty()) else {
            return Ok(FileFormat::Csv);
        };

        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("xlsx") => Ok(FileFormat::Xlsx),
            Some("json") => Ok(FileFormat::Json),
            _ => Err(AppError::UnsupportedFormat(name.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileFormat::Csv => "CSV",
            FileFormat::Xlsx => "Excel",
            FileFormat::Json => "JSON",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::TimeUnit;

    #[test]
    fn text_values_keep_their_source_text() {
        let mut column = RawColumn::new("code");
        for raw in ["007", "2.50", "TRUE", "NA"] {
            column.push_text(raw);
        }
        column.push(Cell::Float(3.0));

        assert_eq!(column.cells()[0], Cell::Int(7));
        assert_eq!(column.cells()[3], Cell::Empty);
        assert_eq!(
            column.texts(),
            &[
                Some("007".to_string()),
                Some("2.50".to_string()),
                Some("TRUE".to_string()),
                None,
                Some("3.0".to_string()),
            ]
        );
    }

    #[test]
    fn format_follows_the_extension() {
        assert_eq!(FileFormat::from_file_name(Some("data.CSV")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name(Some("report.xlsx")).unwrap(), FileFormat::Xlsx);
        assert_eq!(FileFormat::from_file_name(Some("a.b.json")).unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::from_file_name(None).unwrap(), FileFormat::Csv);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let err = FileFormat::from_file_name(Some("notes.txt")).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(ref name) if name == "notes.txt"));
        assert!(FileFormat::from_file_name(Some("README")).is_err());
    }

    #[test]
    fn tags_follow_storage_dtype() {
        assert_eq!(ColumnType::from_dtype(&DataType::Int64), ColumnType::Numeric);
        assert_eq!(ColumnType::from_dtype(&DataType::Float64), ColumnType::Numeric);
        assert_eq!(ColumnType::from_dtype(&DataType::Boolean), ColumnType::Boolean);
        assert_eq!(ColumnType::from_dtype(&DataType::String), ColumnType::Text);
        assert_eq!(
            ColumnType::from_dtype(&DataType::Datetime(TimeUnit::Milliseconds, None)),
            ColumnType::Datetime
        );
    }
}
