pub mod inference;
pub mod loader;
pub mod types;
pub mod utils;

use polars::prelude::*;

use crate::error::AppError;
pub use loader::load;
pub use types::{Cell, ColumnType, FileFormat, RawColumn, SAMPLE_SIZE};
use utils::any_value_text;

/// The table loaded from one upload. Lives for a single request.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Runs the classification pass over raw columns and builds the frame.
    pub fn from_columns(columns: &[RawColumn]) -> Result<Self, AppError> {
        let frame = inference::create_dataframe(columns)
            .map_err(|e| AppError::DataFrameError(format!("Failed to create DataFrame: {}", e)))?;
        Ok(Self::new(frame))
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    pub fn column_count(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame.get_column_names()
    }

    pub fn column_types(&self) -> Vec<(String, ColumnType)> {
        self.frame
            .get_columns()
            .iter()
            .map(|series| (series.name().to_string(), ColumnType::from_dtype(series.dtype())))
            .collect()
    }

    pub fn column(&self, name: &str) -> Result<&Series, AppError> {
        self.frame
            .column(name)
            .map_err(|_| AppError::ColumnNotFound(name.to_string()))
    }

    /// Display text of every cell in a row; `None` marks a missing cell.
    pub fn row_values(&self, row: usize) -> Vec<Option<String>> {
        self.frame
            .get_columns()
            .iter()
            .map(|series| series.get(row).ok().and_then(|value| any_value_text(&value)))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Option<String>>> + '_ {
        (0..self.row_count()).map(move |row| self.row_values(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let frame = df!(
            "a" => &[Some(1i64), Some(1), Some(2)],
            "b" => &[Some("x"), Some("x"), None]
        )
        .unwrap();
        Dataset::new(frame)
    }

    #[test]
    fn exposes_shape_and_types() {
        let dataset = sample();
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.column_count(), 2);
        assert_eq!(
            dataset.column_types(),
            vec![("a".to_string(), ColumnType::Numeric), ("b".to_string(), ColumnType::Text)]
        );
    }

    #[test]
    fn rows_render_missing_cells_as_none() {
        let rows: Vec<_> = sample().rows().collect();
        assert_eq!(rows[0], vec![Some("1".to_string()), Some("x".to_string())]);
        assert_eq!(rows[2], vec![Some("2".to_string()), None]);
    }

    #[test]
    fn unknown_columns_are_reported() {
        let err = sample().column("zzz").unwrap_err();
        assert!(matches!(err, AppError::ColumnNotFound(name) if name == "zzz"));
    }
}
