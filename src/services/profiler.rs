use std::collections::HashMap;
use polars::prelude::*;
use serde::Serialize;

use crate::error::AppError;
use crate::services::dataset::{ColumnType, Dataset};
use crate::services::dataset::utils::{round2, series_text};

/// Non-numeric columns with at least this many distinct values are not charted.
pub const MAX_CHART_CATEGORIES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// A column extreme in the column's own storage: integers stay integers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NumericValue {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub mean: Option<f64>,
    pub min: Option<NumericValue>,
    pub max: Option<NumericValue>,
}

/// What the dashboard draws for a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnChart {
    /// Numeric values in row order.
    Line { values: Vec<Option<f64>> },
    /// Value counts for a low-cardinality column.
    Bar { frequencies: Vec<ValueCount> },
    TooManyCategories { unique_count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: ColumnType,
    pub unique_count: usize,
    pub most_frequent: Option<String>,
    pub numeric: Option<NumericStats>,
    pub chart: ColumnChart,
}

pub fn profile(dataset: &Dataset, column: &str) -> Result<ColumnProfile, AppError> {
    let series = dataset.column(column)?;
    let data_type = ColumnType::from_dtype(series.dtype());
    let counts = value_counts(series);
    let unique_count = counts.len();

    let (numeric, chart) = if data_type == ColumnType::Numeric {
        let floats = series.cast(&DataType::Float64)?;
        let values: Vec<Option<f64>> = floats.f64()?.into_iter().collect();
        (Some(numeric_stats(series, &values)?), ColumnChart::Line { values })
    } else if unique_count < MAX_CHART_CATEGORIES {
        (None, ColumnChart::Bar { frequencies: counts.clone() })
    } else {
        (None, ColumnChart::TooManyCategories { unique_count })
    };

    tracing::debug!("Profiled column {} ({}, {} unique)", column, data_type, unique_count);

    Ok(ColumnProfile {
        name: column.to_string(),
        data_type,
        unique_count,
        most_frequent: counts.into_iter().next().map(|vc| vc.value),
        numeric,
        chart,
    })
}

/// Counts of each distinct non-missing value, most frequent first. Equal
/// counts keep first-occurrence order.
pub fn value_counts(series: &Series) -> Vec<ValueCount> {
    let mut counts: Vec<ValueCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for value in series_text(series).into_iter().flatten() {
        match positions.get(&value) {
            Some(&idx) => counts[idx].count += 1,
            None => {
                positions.insert(value.clone(), counts.len());
                counts.push(ValueCount { value, count: 1 });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

fn numeric_stats(series: &Series, values: &[Option<f64>]) -> PolarsResult<NumericStats> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return Ok(NumericStats { mean: None, min: None, max: None });
    }

    let sum: f64 = present.iter().sum();
    let mean = Some(round2(sum / present.len() as f64));

    if series.dtype().is_float() {
        return Ok(NumericStats {
            mean,
            min: present.iter().copied().reduce(f64::min).map(NumericValue::Float),
            max: present.iter().copied().reduce(f64::max).map(NumericValue::Float),
        });
    }

    let ints = series.cast(&DataType::Int64)?;
    let ints = ints.i64()?;
    Ok(NumericStats {
        mean,
        min: ints.min().map(NumericValue::Int),
        max: ints.max().map(NumericValue::Int),
    })
}
