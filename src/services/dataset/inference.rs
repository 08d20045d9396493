use polars::prelude::*;

use super::types::{Cell, ColumnType, RawColumn};

/// Storage chosen for a column by the classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Datetime,
    Text,
}

impl ColumnKind {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnKind::Integer | ColumnKind::Float => ColumnType::Numeric,
            ColumnKind::Boolean => ColumnType::Boolean,
            ColumnKind::Datetime => ColumnType::Datetime,
            ColumnKind::Text => ColumnType::Text,
        }
    }
}

/// Classifies a column from its non-missing cells. A column with no values
/// at all is text.
pub fn detect_column_kind(cells: &[Cell]) -> ColumnKind {
    let (mut ints, mut floats, mut bools, mut dates, mut total) = (0, 0, 0, 0, 0);

    for cell in cells.iter().filter(|c| !matches!(c, Cell::Empty)) {
        total += 1;
        match cell {
            Cell::Int(_) => ints += 1,
            Cell::Float(_) => floats += 1,
            Cell::Bool(_) => bools += 1,
            Cell::DateTime(_) => dates += 1,
            _ => {}
        }
    }

    match () {
        _ if total == 0 => ColumnKind::Text,
        _ if bools == total => ColumnKind::Boolean,
        _ if ints == total => ColumnKind::Integer,
        _ if ints + floats == total => ColumnKind::Float,
        _ if dates == total => ColumnKind::Datetime,
        _ => ColumnKind::Text,
    }
}

/// Builds the typed series for a classified column.
pub fn build_series(column: &RawColumn, kind: ColumnKind) -> PolarsResult<Series> {
    let name = column.name.as_str();
    let cells = column.cells();

    let series = match kind {
        ColumnKind::Integer => {
            let values: Vec<Option<i64>> = cells.iter().map(|c| match c {
                Cell::Int(i) => Some(*i),
                _ => None,
            }).collect();
            Series::new(name, values)
        }
        ColumnKind::Float => {
            let values: Vec<Option<f64>> = cells.iter().map(|c| match c {
                Cell::Int(i) => Some(*i as f64),
                Cell::Float(f) => Some(*f),
                _ => None,
            }).collect();
            Series::new(name, values)
        }
        ColumnKind::Boolean => {
            let values: Vec<Option<bool>> = cells.iter().map(|c| match c {
                Cell::Bool(b) => Some(*b),
                _ => None,
            }).collect();
            Series::new(name, values)
        }
        ColumnKind::Datetime => {
            let millis: Vec<Option<i64>> = cells.iter().map(|c| match c {
                Cell::DateTime(dt) => Some(dt.and_utc().timestamp_millis()),
                _ => None,
            }).collect();
            Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
        ColumnKind::Text => {
            Series::new(name, column.texts().to_vec())
        }
    };

    Ok(series)
}

/// Classifies every column and assembles the frame.
pub fn create_dataframe(columns: &[RawColumn]) -> PolarsResult<DataFrame> {
    let series = columns
        .iter()
        .map(|column| {
            let kind = detect_column_kind(column.cells());
            tracing::debug!("Column {:?} classified as {:?}", column.name, kind);
            build_series(column, kind)
        })
        .collect::<PolarsResult<Vec<_>>>()?;

    DataFrame::new(series)
}
