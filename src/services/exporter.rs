use polars::prelude::*;
use serde_json::{Map, Number, Value};

use crate::error::AppError;
use crate::services::dataset::{ColumnType, Dataset};
use crate::services::dataset::utils::{stored_datetime, DATETIME_FORMAT, ISO_DATETIME_FORMAT};
use crate::services::profiler::value_counts;

const STATISTIC_COLUMN: &str = "statistic";
const NUMERIC_STATISTICS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
const OBJECT_STATISTICS: [&str; 4] = ["count", "unique", "top", "freq"];

/// A downloadable rendering of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Csv,
    Json,
    Summary,
}

impl ExportKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "csv" => Some(ExportKind::Csv),
            "json" => Some(ExportKind::Json),
            "summary" => Some(ExportKind::Summary),
            _ => None,
        }
    }
}

pub fn export(dataset: &Dataset, kind: ExportKind) -> Result<ExportFile, AppError> {
    match kind {
        ExportKind::Csv => export_csv(dataset),
        ExportKind::Json => export_json(dataset),
        ExportKind::Summary => export_describe(dataset),
    }
}

pub fn export_csv(dataset: &Dataset) -> Result<ExportFile, AppError> {
    let mut frame = dataset.frame().clone();
    Ok(ExportFile {
        file_name: "cleaned_data.csv",
        content_type: "text/csv",
        bytes: write_csv(&mut frame)?,
    })
}

/// Array of records in column order; missing cells are `null`.
pub fn export_json(dataset: &Dataset) -> Result<ExportFile, AppError> {
    let columns = dataset.frame().get_columns();
    let records: Vec<Value> = (0..dataset.row_count())
        .map(|row| {
            let record: PolarsResult<Map<String, Value>> = columns
                .iter()
                .map(|series| -> PolarsResult<(String, Value)> {
                    Ok((series.name().to_string(), any_value_json(&series.get(row)?)))
                })
                .collect();
            record.map(Value::Object)
        })
        .collect::<PolarsResult<_>>()?;

    Ok(ExportFile {
        file_name: "cleaned_data.json",
        content_type: "application/json",
        bytes: serde_json::to_vec(&records)?,
    })
}

/// Descriptive statistics per numeric column. Without numeric columns every
/// column is described by count, distinct values and its most common value.
pub fn export_describe(dataset: &Dataset) -> Result<ExportFile, AppError> {
    let mut frame = describe(dataset)?;
    Ok(ExportFile {
        file_name: "summary.csv",
        content_type: "text/csv",
        bytes: write_csv(&mut frame)?,
    })
}

pub fn describe(dataset: &Dataset) -> PolarsResult<DataFrame> {
    let numeric: Vec<&Series> = dataset
        .frame()
        .get_columns()
        .iter()
        .filter(|s| ColumnType::from_dtype(s.dtype()) == ColumnType::Numeric)
        .collect();

    if numeric.is_empty() {
        return describe_objects(dataset);
    }

    let mut columns = vec![Series::new(STATISTIC_COLUMN, NUMERIC_STATISTICS.to_vec())];
    for series in numeric {
        let floats = series.cast(&DataType::Float64)?;
        let mut values: Vec<f64> = floats.f64()?.into_iter().flatten().collect();
        values.sort_by(f64::total_cmp);
        columns.push(Series::new(series.name(), numeric_description(&values).to_vec()));
    }
    DataFrame::new(columns)
}

fn describe_objects(dataset: &Dataset) -> PolarsResult<DataFrame> {
    let mut columns = vec![Series::new(STATISTIC_COLUMN, OBJECT_STATISTICS.to_vec())];
    for series in dataset.frame().get_columns() {
        let counts = value_counts(series);
        let top = counts.first();
        let stats: Vec<Option<String>> = vec![
            Some((series.len() - series.null_count()).to_string()),
            Some(counts.len().to_string()),
            top.map(|vc| vc.value.clone()),
            top.map(|vc| vc.count.to_string()),
        ];
        columns.push(Series::new(series.name(), stats));
    }
    DataFrame::new(columns)
}

/// count, mean, std, min, 25%, 50%, 75%, max of sorted values.
fn numeric_description(sorted: &[f64]) -> [Option<f64>; 8] {
    let n = sorted.len();
    if n == 0 {
        return [Some(0.0), None, None, None, None, None, None, None];
    }

    let mean = sorted.iter().sum::<f64>() / n as f64;
    // sample standard deviation
    let std = (n > 1).then(|| {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    [
        Some(n as f64),
        Some(mean),
        std,
        Some(sorted[0]),
        Some(quantile(sorted, 0.25)),
        Some(quantile(sorted, 0.5)),
        Some(quantile(sorted, 0.75)),
        Some(sorted[n - 1]),
    ]
}

/// Linear interpolation between the closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

fn write_csv(frame: &mut DataFrame) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
        .finish(frame)?;
    Ok(buf)
}

fn any_value_json(value: &AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Int64(i) => Value::from(*i),
        AnyValue::Float64(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::Datetime(v, unit, _) => stored_datetime(*v, unit)
            .map_or(Value::Null, |dt| Value::String(dt.format(ISO_DATETIME_FORMAT).to_string())),
        other => Value::String(other.to_string()),
    }
}
