use std::collections::HashSet;
use serde::Serialize;

use crate::services::dataset::{ColumnType, Dataset};
use crate::services::dataset::utils::round2;

/// Columns missing more than this share of their values are flagged.
pub const HIGH_MISSING_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: ColumnType,
    pub missing_count: usize,
    /// `100 * missing_count / row_count` to two decimals; 0 for an empty dataset.
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub row_count: usize,
    pub column_count: usize,
    pub duplicate_count: usize,
    pub columns: Vec<ColumnSummary>,
}

impl Summary {
    /// Columns sorted by missing percentage, highest first. Ties keep
    /// column order.
    pub fn missing_by_severity(&self) -> Vec<&ColumnSummary> {
        let mut columns: Vec<&ColumnSummary> = self.columns.iter().collect();
        columns.sort_by(|a, b| b.missing_percentage.total_cmp(&a.missing_percentage));
        columns
    }

    pub fn high_missing_columns(&self) -> Vec<&str> {
        self.missing_by_severity()
            .into_iter()
            // unrounded share, so 50.0005% still counts
            .filter(|c| c.missing_count as f64 * 100.0 > HIGH_MISSING_PERCENT * self.row_count as f64)
            .map(|c| c.name.as_str())
            .collect()
    }
}

pub fn summarize(dataset: &Dataset) -> Summary {
    let row_count = dataset.row_count();

    let columns = dataset
        .frame()
        .get_columns()
        .iter()
        .map(|series| {
            let missing_count = series.null_count();
            ColumnSummary {
                name: series.name().to_string(),
                data_type: ColumnType::from_dtype(series.dtype()),
                missing_count,
                missing_percentage: missing_percentage(missing_count, row_count),
            }
        })
        .collect();

    Summary {
        row_count,
        column_count: dataset.column_count(),
        duplicate_count: duplicate_rows(dataset).len(),
        columns,
    }
}

pub fn missing_percentage(missing_count: usize, row_count: usize) -> f64 {
    if row_count == 0 {
        return 0.0;
    }
    round2(missing_count as f64 / row_count as f64 * 100.0)
}

/// Indices of rows that repeat an earlier row across every column. Missing
/// cells compare equal to each other.
pub fn duplicate_rows(dataset: &Dataset) -> Vec<usize> {
    let mut seen = HashSet::with_capacity(dataset.row_count());
    dataset
        .rows()
        .enumerate()
        .filter_map(|(idx, row)| if seen.insert(row) { None } else { Some(idx) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn dataset(frame: DataFrame) -> Dataset {
        Dataset::new(frame)
    }

    fn example() -> Dataset {
        dataset(df!(
            "a" => &[Some(1i64), Some(1), Some(2)],
            "b" => &[Some("x"), Some("x"), None]
        ).unwrap())
    }

    #[test]
    fn summarizes_the_reference_example() {
        let summary = summarize(&example());

        assert_eq!(summary.row_count, 3);
        assert_eq!(summary.column_count, 2);
        assert_eq!(summary.duplicate_count, 1);
        assert_eq!(
            summary.columns,
            vec![
                ColumnSummary {
                    name: "a".to_string(),
                    data_type: ColumnType::Numeric,
                    missing_count: 0,
                    missing_percentage: 0.0,
                },
                ColumnSummary {
                    name: "b".to_string(),
                    data_type: ColumnType::Text,
                    missing_count: 1,
                    missing_percentage: 33.33,
                },
            ]
        );
    }

    #[test]
    fn distinct_rows_have_no_duplicates() {
        let ds = dataset(df!("a" => &[1i64, 2, 3], "b" => &["x", "x", "x"]).unwrap());
        assert_eq!(summarize(&ds).duplicate_count, 0);
        assert!(duplicate_rows(&ds).is_empty());
    }

    #[test]
    fn missing_cells_count_as_equal_for_duplicates() {
        let ds = dataset(df!(
            "a" => &[None, None, Some(1.5f64), Some(1.5)],
            "b" => &[Some("x"), Some("x"), Some("y"), Some("z")]
        ).unwrap());
        assert_eq!(duplicate_rows(&ds), vec![1]);
    }

    #[test]
    fn empty_dataset_reports_zero_percent() {
        let ds = dataset(df!("a" => Vec::<Option<i64>>::new()).unwrap());
        let summary = summarize(&ds);
        assert_eq!(summary.row_count, 0);
        assert_eq!(summary.columns[0].missing_count, 0);
        assert_eq!(summary.columns[0].missing_percentage, 0.0);
        assert_eq!(missing_percentage(0, 0), 0.0);
    }

    #[test]
    fn counts_stay_within_row_count() {
        let ds = dataset(df!(
            "a" => &[None::<i64>, None, None],
            "b" => &[Some(true), Some(true), Some(true)]
        ).unwrap());
        let summary = summarize(&ds);

        assert!(summary.duplicate_count <= summary.row_count);
        assert_eq!(summary.duplicate_count, 2);
        for column in &summary.columns {
            assert!(column.missing_count <= summary.row_count);
        }
        assert_eq!(summary.columns[0].missing_percentage, 100.0);
    }

    #[test]
    fn severity_order_and_high_missing_flags() {
        let ds = dataset(df!(
            "low" => &[Some(1i64), Some(2), Some(3), None],
            "high" => &[None, None, None, Some("k")],
            "none" => &[Some(1i64), Some(2), Some(3), Some(4)]
        ).unwrap());
        let summary = summarize(&ds);

        let order: Vec<&str> = summary.missing_by_severity().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(order, vec!["high", "low", "none"]);
        assert_eq!(summary.high_missing_columns(), vec!["high"]);
    }

    #[test]
    fn high_missing_uses_the_unrounded_share() {
        let mut missing = vec![None::<i64>; 20_001];
        missing.extend(vec![Some(1); 19_999]);
        let ds = dataset(df!("a" => missing).unwrap());
        let summary = summarize(&ds);

        assert_eq!(summary.columns[0].missing_percentage, 50.0);
        assert_eq!(summary.high_missing_columns(), vec!["a"]);

        let half = dataset(df!("b" => &[None, Some(1i64)]).unwrap());
        assert!(summarize(&half).high_missing_columns().is_empty());
    }
}
