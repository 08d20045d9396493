//! Data behind the five dashboard views.

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::AppError;
use crate::services::dataset::{ColumnType, Dataset, SAMPLE_SIZE};
use crate::services::dataset::utils::series_text;
use crate::services::profiler::{self, ColumnProfile};
use crate::services::summary::{self, Summary};

pub const DEFAULT_PREVIEW_ROWS: usize = 10;
pub const MIN_PREVIEW_ROWS: usize = 5;
pub const MAX_PREVIEW_ROWS: usize = 100;

#[derive(Debug, Serialize)]
pub struct Preview {
    pub rows: usize,
    pub columns: usize,
    pub headers: Vec<String>,
    pub data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Serialize)]
pub struct MissingEntry {
    pub column: String,
    pub missing_values: usize,
    pub missing_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct MissingReport {
    pub columns: Vec<MissingEntry>,
    pub high_missing_columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DuplicateRow {
    pub index: usize,
    pub values: Vec<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct DuplicateReport {
    pub duplicate_count: usize,
    pub headers: Vec<String>,
    pub rows: Vec<DuplicateRow>,
}

#[derive(Debug, Serialize)]
pub struct ColumnOverview {
    pub name: String,
    pub data_type: ColumnType,
    pub sample_values: SmallVec<[String; SAMPLE_SIZE]>,
}

#[derive(Debug, Serialize)]
pub struct ColumnStats {
    pub columns: Vec<ColumnOverview>,
    pub selected: ColumnProfile,
}

fn headers(dataset: &Dataset) -> Vec<String> {
    dataset.column_names().into_iter().map(str::to_string).collect()
}

/// First rows of the dataset; the requested count is clamped to 5..=100.
pub fn preview(dataset: &Dataset, requested_rows: Option<usize>) -> Preview {
    let shown = requested_rows
        .unwrap_or(DEFAULT_PREVIEW_ROWS)
        .clamp(MIN_PREVIEW_ROWS, MAX_PREVIEW_ROWS);

    Preview {
        rows: dataset.row_count(),
        columns: dataset.column_count(),
        headers: headers(dataset),
        data: dataset.rows().take(shown).collect(),
    }
}

pub fn missing_report(summary: &Summary) -> MissingReport {
    MissingReport {
        columns: summary
            .missing_by_severity()
            .into_iter()
            .map(|c| MissingEntry {
                column: c.name.clone(),
                missing_values: c.missing_count,
                missing_percent: c.missing_percentage,
            })
            .collect(),
        high_missing_columns: summary
            .high_missing_columns()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

pub fn duplicate_report(dataset: &Dataset) -> DuplicateReport {
    let rows: Vec<DuplicateRow> = summary::duplicate_rows(dataset)
        .into_iter()
        .map(|index| DuplicateRow { index, values: dataset.row_values(index) })
        .collect();

    DuplicateReport {
        duplicate_count: rows.len(),
        headers: headers(dataset),
        rows,
    }
}

/// Type table for every column plus the profile of `column`, or of the
/// first column when none is selected.
pub fn column_stats(dataset: &Dataset, column: Option<&str>) -> Result<ColumnStats, AppError> {
    let selected = match column {
        Some(name) => name.to_string(),
        None => dataset
            .column_names()
            .first()
            .map(|name| name.to_string())
            .ok_or_else(|| AppError::InvalidInput("The uploaded file has no columns".to_string()))?,
    };

    let columns = dataset
        .frame()
        .get_columns()
        .iter()
        .map(|series| ColumnOverview {
            name: series.name().to_string(),
            data_type: ColumnType::from_dtype(series.dtype()),
            sample_values: series_text(series).into_iter().flatten().take(SAMPLE_SIZE).collect(),
        })
        .collect();

    Ok(ColumnStats {
        columns,
        selected: profiler::profile(dataset, &selected)?,
    })
}
