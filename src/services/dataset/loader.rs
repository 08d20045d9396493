use std::collections::HashMap;
use std::io::Cursor;
use bytes::Bytes;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use polars::prelude::*;
use serde_json::Value;

use crate::error::AppError;
use super::Dataset;
use super::types::{Cell, FileFormat, RawColumn};
use super::utils::{clean_column_names, excel_serial_to_datetime, is_null_marker, parse_datetime, parse_text_cell};

/// Parses an uploaded buffer under its declared format. Buffers above
/// `max_bytes` are rejected before any parsing happens.
pub fn load(data: Bytes, format: FileFormat, max_bytes: usize) -> Result<Dataset, AppError> {
    if data.len() > max_bytes {
        tracing::warn!("Rejecting {} upload of {} bytes (limit {})", format, data.len(), max_bytes);
        return Err(AppError::FileTooLarge { size: data.len(), limit: max_bytes });
    }

    let start = std::time::Instant::now();
    tracing::info!("Loading {} file, size: {}KB", format, data.len() / 1024);

    let mut columns = match format {
        FileFormat::Csv => read_csv(data),
        FileFormat::Xlsx => read_xlsx(data),
        FileFormat::Json => read_json(&data),
    }
    .map_err(|e| {
        tracing::error!("Failed to parse {} file: {}", format, e);
        e
    })?;

    let raw_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    for (column, name) in columns.iter_mut().zip(clean_column_names(&raw_names)) {
        column.name = name;
    }

    let dataset = Dataset::from_columns(&columns)?;
    tracing::info!(
        "Loaded {} rows x {} columns in {:?}",
        dataset.row_count(),
        dataset.column_count(),
        start.elapsed()
    );
    Ok(dataset)
}

fn parse_error(format: FileFormat, err: impl std::fmt::Display) -> AppError {
    AppError::ParseError(format!("Failed to parse {} file: {}", format, err))
}

fn read_csv(data: Bytes) -> Result<Vec<RawColumn>, AppError> {
    // Every column is read as text; typing happens in the classification pass.
    // The header is read as the first data row so repeated and blank names
    // reach `clean_column_names` untouched.
    let df = CsvReader::new(Cursor::new(data))
        .has_header(false)
        .infer_schema(Some(0))
        .finish()
        .map_err(|e| parse_error(FileFormat::Csv, e))?;

    df.get_columns()
        .iter()
        .map(|series| -> Result<RawColumn, AppError> {
            let text = series.cast(&DataType::String)?;
            let mut values = text.str()?.into_iter();
            let name = values.next().flatten().unwrap_or_default();

            let mut column = RawColumn::new(name);
            for value in values {
                match value {
                    Some(raw) => column.push_text(raw),
                    None => column.push(Cell::Empty),
                }
            }
            Ok(column)
        })
        .collect()
}

fn read_xlsx(data: Bytes) -> Result<Vec<RawColumn>, AppError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
        .map_err(|e| parse_error(FileFormat::Xlsx, e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| parse_error(FileFormat::Xlsx, "no sheets found in workbook"))?;
    tracing::debug!("Reading worksheet {}", sheet_name);

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| parse_error(FileFormat::Xlsx, e))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        tracing::warn!("Sheet {} is empty", sheet_name);
        return Ok(Vec::new());
    };

    let mut columns: Vec<RawColumn> = header
        .iter()
        .map(|cell| match cell {
            Data::Empty => RawColumn::new(""),
            other => RawColumn::new(other.to_string()),
        })
        .collect();

    for row in rows {
        for (idx, column) in columns.iter_mut().enumerate() {
            column.push(row.get(idx).map_or(Cell::Empty, excel_cell));
        }
    }

    Ok(columns)
}

fn excel_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        // xlsx stores every number as a float
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Cell::Int(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if is_null_marker(s) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(d) => excel_serial_to_datetime(d.as_f64()).map_or(Cell::Empty, Cell::DateTime),
        Data::DateTimeIso(s) => parse_datetime(s).map_or_else(|| Cell::Text(s.clone()), Cell::DateTime),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn read_json(data: &[u8]) -> Result<Vec<RawColumn>, AppError> {
    let document: Value = serde_json::from_slice(data).map_err(|e| parse_error(FileFormat::Json, e))?;

    match document {
        Value::Array(records) => read_json_records(&records),
        Value::Object(columns) => read_json_columns(&columns),
        _ => Err(parse_error(
            FileFormat::Json,
            "expected an array of records or an object of columns",
        )),
    }
}

/// `[{"a": 1, "b": "x"}, ...]`; columns appear in first-seen order and
/// absent keys are missing.
fn read_json_records(records: &[Value]) -> Result<Vec<RawColumn>, AppError> {
    let mut columns: Vec<RawColumn> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (row, record) in records.iter().enumerate() {
        let Value::Object(fields) = record else {
            return Err(parse_error(FileFormat::Json, format!("record {} is not an object", row)));
        };

        for (key, value) in fields {
            let idx = *positions.entry(key.clone()).or_insert_with(|| {
                columns.push(RawColumn::from_cells(key.as_str(), vec![Cell::Empty; row]));
                columns.len() - 1
            });
            push_json(&mut columns[idx], value);
        }

        for column in columns.iter_mut().filter(|c| c.len() <= row) {
            column.push(Cell::Empty);
        }
    }

    Ok(columns)
}

/// `{"a": {"0": 1, "1": 2}}` or `{"a": [1, 2]}`; rows are the union of the
/// index keys (array positions for arrays) in first-seen order.
fn read_json_columns(document: &serde_json::Map<String, Value>) -> Result<Vec<RawColumn>, AppError> {
    let mut row_positions: HashMap<String, usize> = HashMap::new();
    let mut keyed_columns: Vec<(&String, HashMap<usize, &Value>)> = Vec::new();

    for (name, values) in document {
        let entries: Vec<(String, &Value)> = match values {
            Value::Object(by_index) => by_index.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Array(items) => items.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
            _ => {
                return Err(parse_error(
                    FileFormat::Json,
                    format!("column {:?} must be an object or an array", name),
                ))
            }
        };

        let mut cells = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            let next_row = row_positions.len();
            let row = *row_positions.entry(key).or_insert(next_row);
            cells.insert(row, value);
        }
        keyed_columns.push((name, cells));
    }

    let row_count = row_positions.len();
    Ok(keyed_columns
        .into_iter()
        .map(|(name, cells)| {
            let mut column = RawColumn::new(name.as_str());
            for row in 0..row_count {
                match cells.get(&row) {
                    Some(value) => push_json(&mut column, value),
                    None => column.push(Cell::Empty),
                }
            }
            column
        })
        .collect())
}

fn push_json(column: &mut RawColumn, value: &Value) {
    match value {
        Value::String(s) => column.push_text(s),
        other => column.push(json_cell(other)),
    }
}

fn json_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map_or(Cell::Empty, Cell::Float),
        },
        Value::String(s) => parse_text_cell(s),
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dataset::ColumnType;
    use crate::services::summary::summarize;
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::Workbook;

    const LIMIT: usize = 1024 * 1024;

    fn load_str(text: &str, format: FileFormat) -> Result<Dataset, AppError> {
        load(Bytes::from(text.to_string()), format, LIMIT)
    }

    #[test]
    fn loads_csv_with_inferred_types() {
        let csv = "id,name,score,active,joined\n\
                   1,alice,9.5,true,2024-01-02\n\
                   2,bob,,false,2024-02-03\n\
                   3,NA,7,true,2024-03-04\n";
        let dataset = load_str(csv, FileFormat::Csv).unwrap();

        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.column_count(), 5);
        assert_eq!(
            dataset.column_types(),
            vec![
                ("id".to_string(), ColumnType::Numeric),
                ("name".to_string(), ColumnType::Text),
                ("score".to_string(), ColumnType::Numeric),
                ("active".to_string(), ColumnType::Boolean),
                ("joined".to_string(), ColumnType::Datetime),
            ]
        );
        assert_eq!(dataset.column("name").unwrap().null_count(), 1);
        assert_eq!(dataset.column("score").unwrap().dtype(), &DataType::Float64);
        assert_eq!(dataset.column("id").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn text_columns_keep_uploaded_values() {
        let dataset = load_str("code\n007\n7\nx\n", FileFormat::Csv).unwrap();
        let rows: Vec<Vec<Option<String>>> = dataset.rows().collect();
        assert_eq!(
            rows,
            vec![
                vec![Some("007".to_string())],
                vec![Some("7".to_string())],
                vec![Some("x".to_string())],
            ]
        );
        assert_eq!(summarize(&dataset).duplicate_count, 0);

        let mixed = load_str("v\n2.50\n1e3\nTRUE\n2024-01-02\nabc\n", FileFormat::Csv).unwrap();
        let values: Vec<Option<&str>> = mixed.column("v").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            values,
            vec![Some("2.50"), Some("1e3"), Some("TRUE"), Some("2024-01-02"), Some("abc")]
        );
    }

    #[test]
    fn csv_headers_are_cleaned() {
        let dataset = load_str("a,a,,b\n1,2,3,4\n", FileFormat::Csv).unwrap();
        assert_eq!(dataset.column_names(), vec!["a", "a.1", "Unnamed: 2", "b"]);
        assert_eq!(dataset.row_count(), 1);
        assert_eq!(dataset.column("a.1").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn loads_the_first_sheet_of_a_workbook() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "id").unwrap();
        sheet.write_string(0, 1, "name").unwrap();
        sheet.write_string(0, 2, "id").unwrap();
        sheet.write_number(1, 0, 1.0).unwrap();
        sheet.write_string(1, 1, "007").unwrap();
        sheet.write_number(1, 2, 2.5).unwrap();
        sheet.write_number(2, 0, 2.0).unwrap();
        sheet.write_string(2, 1, "N/A").unwrap();
        sheet.write_number(2, 2, 4.0).unwrap();
        workbook.add_worksheet().write_string(0, 0, "ignored").unwrap();
        let data = Bytes::from(workbook.save_to_buffer().unwrap());

        let dataset = load(data, FileFormat::Xlsx, LIMIT).unwrap();
        assert_eq!(dataset.column_names(), vec!["id", "name", "id.1"]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.column("id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(dataset.column("name").unwrap().null_count(), 1);
        assert_eq!(dataset.column("id.1").unwrap().dtype(), &DataType::Float64);
        assert_eq!(
            dataset.row_values(0),
            vec![Some("1".to_string()), Some("007".to_string()), Some("2.5".to_string())]
        );
    }

    #[test]
    fn empty_worksheet_loads_as_an_empty_dataset() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        let data = Bytes::from(workbook.save_to_buffer().unwrap());

        let dataset = load(data, FileFormat::Xlsx, LIMIT).unwrap();
        assert_eq!(dataset.row_count(), 0);
        assert_eq!(dataset.column_count(), 0);
    }

    #[test]
    fn header_only_csv_has_no_rows() {
        let dataset = load_str("a,b\n", FileFormat::Csv).unwrap();
        assert_eq!(dataset.row_count(), 0);
        assert_eq!(dataset.column_count(), 2);
    }

    #[test]
    fn loads_json_records_in_first_seen_order() {
        let json = r#"[{"a": 1, "b": "x"}, {"b": "y", "c": true}, {"a": 2.5}]"#;
        let dataset = load_str(json, FileFormat::Json).unwrap();

        assert_eq!(dataset.column_names(), vec!["a", "b", "c"]);
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.column("a").unwrap().null_count(), 1);
        assert_eq!(dataset.column("b").unwrap().null_count(), 1);
        assert_eq!(dataset.column("c").unwrap().null_count(), 2);
        assert_eq!(dataset.column("a").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn loads_json_columns() {
        let json = r#"{"a": {"0": 1, "1": 2}, "b": {"1": "y", "2": "z"}}"#;
        let dataset = load_str(json, FileFormat::Json).unwrap();
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.row_values(2), vec![None, Some("z".to_string())]);

        let arrays = load_str(r#"{"a": [1, 2, 3], "b": [null, "q"]}"#, FileFormat::Json).unwrap();
        assert_eq!(arrays.row_count(), 3);
        assert_eq!(arrays.column("b").unwrap().null_count(), 2);
    }

    #[test]
    fn rejects_unparseable_buffers() {
        assert!(matches!(load_str("[1, 2", FileFormat::Json), Err(AppError::ParseError(_))));
        assert!(matches!(load_str("42", FileFormat::Json), Err(AppError::ParseError(_))));
        assert!(matches!(load_str("[1, 2]", FileFormat::Json), Err(AppError::ParseError(_))));
        assert!(matches!(load_str("a,b\n1,2\n", FileFormat::Xlsx), Err(AppError::ParseError(_))));
    }

    #[test]
    fn oversized_buffers_are_rejected_before_parsing() {
        // Not valid JSON: a parse attempt would report a ParseError instead.
        let data = Bytes::from(vec![b'{'; 64]);
        let err = load(data, FileFormat::Json, 32).unwrap_err();
        assert!(matches!(err, AppError::FileTooLarge { size: 64, limit: 32 }));
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn excel_cells_map_to_typed_cells() {
        assert_eq!(excel_cell(&Data::Float(3.0)), Cell::Int(3));
        assert_eq!(excel_cell(&Data::Float(2.5)), Cell::Float(2.5));
        assert_eq!(excel_cell(&Data::String("N/A".to_string())), Cell::Empty);
        assert_eq!(excel_cell(&Data::String("42".to_string())), Cell::Text("42".to_string()));
        assert_eq!(excel_cell(&Data::Empty), Cell::Empty);
    }
}
