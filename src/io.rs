//! Reading and writing tables as CSV (via polars) and XLSX (calamine in, rust_xlsxwriter out).

use crate::error::{ReclimitError, Result};
use crate::table::{Cell, Row, Table};
use crate::FileFormat;
use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::info;

/// Rendering for spreadsheet date/time cells.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format-specific knobs for reading and writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    /// Field separator for CSV input and output.
    pub delimiter: u8,
    /// Worksheet to read: 0-based index or name. First sheet when `None`.
    pub excel_sheet: Option<String>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            excel_sheet: None,
        }
    }
}

/// Resolve the format of `path`, preferring an explicit hint over the extension.
pub fn detect_format(path: &Path, hint: Option<FileFormat>) -> Result<FileFormat> {
    if let Some(format) = hint {
        return Ok(format);
    }
    FileFormat::from_path(path).ok_or_else(|| {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| path.display().to_string());
        ReclimitError::UnsupportedFormat(ext)
    })
}

/// Load a table from file contents with default options.
pub fn load(bytes: &[u8], format: FileFormat) -> Result<Table> {
    load_with(bytes, format, &FileOptions::default())
}

pub fn load_with(bytes: &[u8], format: FileFormat, options: &FileOptions) -> Result<Table> {
    match format {
        FileFormat::Csv => load_csv(bytes, options.delimiter),
        FileFormat::Xlsx => load_xlsx(bytes, options.excel_sheet.as_deref()),
    }
}

/// Read a file from disk. The format comes from `hint` or the file extension.
pub fn load_path(path: &Path, hint: Option<FileFormat>, options: &FileOptions) -> Result<Table> {
    let format = detect_format(path, hint)?;
    let bytes = fs::read(path)?;
    let table = load_with(&bytes, format, options)?;
    info!(
        path = %path.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "loaded table"
    );
    Ok(table)
}

/// Column names only. For CSV this parses just the first data row.
pub fn header_of(bytes: &[u8], format: FileFormat, options: &FileOptions) -> Result<Vec<String>> {
    match format {
        FileFormat::Csv => {
            let df = csv_frame(bytes, options.delimiter, Some(1))?;
            Ok(df
                .get_column_names()
                .into_iter()
                .map(|name| name.to_string())
                .collect())
        }
        FileFormat::Xlsx => {
            let range = xlsx_range(bytes, options.excel_sheet.as_deref())?;
            Ok(range.rows().next().map(header_from_row).unwrap_or_default())
        }
    }
}

/// Serialize a table with default options.
pub fn save(table: &Table, format: FileFormat) -> Result<Vec<u8>> {
    save_with(table, format, &FileOptions::default())
}

pub fn save_with(table: &Table, format: FileFormat, options: &FileOptions) -> Result<Vec<u8>> {
    match format {
        FileFormat::Csv => save_csv(table, options.delimiter),
        FileFormat::Xlsx => save_xlsx(table),
    }
}

/// Write a table to disk in `format`.
pub fn save_path(
    table: &Table,
    path: &Path,
    format: FileFormat,
    options: &FileOptions,
) -> Result<()> {
    let bytes = save_with(table, format, options)?;
    fs::write(path, bytes)?;
    info!(
        path = %path.display(),
        rows = table.num_rows(),
        format = format.extension(),
        "saved table"
    );
    Ok(())
}

/// Every column is read as a string; typing happens per condition.
fn csv_frame(bytes: &[u8], delimiter: u8, n_rows: Option<usize>) -> Result<DataFrame> {
    let read_options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_n_rows(n_rows)
        .map_parse_options(|opts| opts.with_separator(delimiter));
    let df = CsvReader::new(Cursor::new(bytes))
        .with_options(read_options)
        .finish()?;
    Ok(df)
}

fn load_csv(bytes: &[u8], delimiter: u8) -> Result<Table> {
    let df = csv_frame(bytes, delimiter, None)?;
    let header: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let mut rows: Vec<Row> = (0..df.height())
        .map(|_| Vec::with_capacity(header.len()))
        .collect();
    for column in df.get_columns() {
        let values = column.str()?;
        for (row, value) in rows.iter_mut().zip(values.into_iter()) {
            row.push(value.map(Cell::from_text).unwrap_or(Cell::Missing));
        }
    }
    Table::new(header, rows)
}

/// Missing cells and empty text are both written as an empty field.
fn save_csv(table: &Table, delimiter: u8) -> Result<Vec<u8>> {
    let columns: Vec<Column> = table
        .header()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values: Vec<Option<String>> = table
                .column(idx)
                .map(|cell| Some(cell.render()).filter(|text| !text.is_empty()))
                .collect();
            Series::new(name.as_str().into(), values).into()
        })
        .collect();
    let mut df = DataFrame::new(columns)?;
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_separator(delimiter)
        .finish(&mut df)?;
    Ok(buf)
}

/// Select the worksheet by 0-based index or by name.
fn xlsx_range(bytes: &[u8], sheet: Option<&str>) -> Result<Range<Data>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    if workbook.sheet_names().is_empty() {
        return Err(ReclimitError::format("xlsx", "workbook has no worksheets"));
    }
    let range = match sheet {
        Some(sel) => match sel.parse::<usize>() {
            Ok(idx) => workbook.worksheet_range_at(idx).ok_or_else(|| {
                ReclimitError::Validation(format!("no worksheet at index {}", idx))
            })??,
            Err(_) => workbook.worksheet_range(sel)?,
        },
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ReclimitError::format("xlsx", "no first worksheet"))??,
    };
    Ok(range)
}

/// Column names from the first sheet row.
///
/// Blank names become `column_<n>` and repeats get a `_duplicated_<k>` suffix, the way polars
/// names CSV headers, so that every name is unique.
fn header_from_row(row: &[Data]) -> Vec<String> {
    let raw: Vec<String> = row.iter().map(|data| cell_from_xlsx(data).render()).collect();
    let reserved: HashSet<&str> = raw
        .iter()
        .map(String::as_str)
        .filter(|name| !name.is_empty())
        .collect();
    let mut assigned: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut header = Vec::with_capacity(raw.len());
    for (idx, name) in raw.iter().enumerate() {
        let unique = if name.is_empty() {
            let base = format!("column_{}", idx + 1);
            if reserved.contains(base.as_str()) || assigned.contains(&base) {
                deduplicated(&base, &reserved, &assigned)
            } else {
                base
            }
        } else if assigned.contains(name) {
            deduplicated(name, &reserved, &assigned)
        } else {
            name.clone()
        };
        assigned.insert(unique.clone());
        header.push(unique);
    }
    header
}

fn deduplicated(base: &str, reserved: &HashSet<&str>, assigned: &HashSet<String>) -> String {
    (0..)
        .map(|k| format!("{}_duplicated_{}", base, k))
        .find(|name| !reserved.contains(name.as_str()) && !assigned.contains(name))
        .unwrap_or_else(|| base.to_string())
}

fn cell_from_xlsx(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::from_text(s),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Cell::Text(naive.format(DATETIME_FORMAT).to_string()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
        Data::Error(e) => Cell::Text(e.to_string()),
        Data::Empty => Cell::Missing,
    }
}

fn load_xlsx(bytes: &[u8], sheet: Option<&str>) -> Result<Table> {
    let range = xlsx_range(bytes, sheet)?;
    let mut rows = range.rows();
    let Some(first) = rows.next() else {
        return Ok(Table::default());
    };
    let header = header_from_row(first);
    let body: Vec<Row> = rows
        .map(|row| row.iter().map(cell_from_xlsx).collect())
        .collect();
    Table::new(header, body)
}

fn save_xlsx(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, name) in table.header().iter().enumerate() {
        worksheet.write_string(0, column_number(col)?, name)?;
    }
    for (idx, row) in table.rows().iter().enumerate() {
        let r = u32::try_from(idx + 1)
            .map_err(|_| ReclimitError::Validation("too many rows for an xlsx sheet".into()))?;
        for (col, cell) in row.iter().enumerate() {
            let c = column_number(col)?;
            match cell {
                Cell::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Cell::Text(s) if !s.is_empty() => {
                    worksheet.write_string(r, c, s)?;
                }
                Cell::Text(_) | Cell::Missing => {}
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn column_number(col: usize) -> Result<u16> {
    u16::try_from(col)
        .map_err(|_| ReclimitError::Validation("too many columns for an xlsx sheet".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_csv_all_text() {
        let table = load(b"name,age\nAlice,30\nBob,\n", FileFormat::Csv).unwrap();
        assert_eq!(table.header(), &["name".to_string(), "age".to_string()]);
        assert_eq!(table.rows()[0][1], Cell::Text("30".to_string()));
        assert!(table.rows()[1][1].is_missing());
    }

    #[test]
    fn test_load_csv_delimiter() {
        let options = FileOptions {
            delimiter: b';',
            ..FileOptions::default()
        };
        let table = load_with(b"a;b\n1;2\n", FileFormat::Csv, &options).unwrap();
        assert_eq!(table.to_string_rows(), vec![vec!["1", "2"]]);
    }

    #[test]
    fn test_csv_header_only() {
        let table = load(b"a,b\n", FileFormat::Csv).unwrap();
        assert_eq!(table.num_columns(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_save_csv() {
        let table = Table::new(
            vec!["name".into(), "score".into()],
            vec![
                vec![Cell::Text("Alice".into()), Cell::Number(10.0)],
                vec![Cell::Text("Bob".into()), Cell::Missing],
            ],
        )
        .unwrap();
        let bytes = save(&table, FileFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "name,score\nAlice,10\nBob,\n");
    }

    #[test]
    fn test_xlsx_cells() {
        let table = Table::new(
            vec!["name".into(), "score".into()],
            vec![
                vec![Cell::Text("Alice".into()), Cell::Number(10.5)],
                vec![Cell::Text("Bob".into()), Cell::Missing],
            ],
        )
        .unwrap();
        let bytes = save(&table, FileFormat::Xlsx).unwrap();
        let loaded = load(&bytes, FileFormat::Xlsx).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_header_of() {
        let headers = header_of(b"x,y,z\n1,2,3\n", FileFormat::Csv, &FileOptions::default())
            .unwrap();
        assert_eq!(headers, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format(Path::new("a.CSV"), None).unwrap(),
            FileFormat::Csv
        );
        assert_eq!(
            detect_format(Path::new("a.txt"), Some(FileFormat::Csv)).unwrap(),
            FileFormat::Csv
        );
        let err = detect_format(Path::new("a.parquet"), None).unwrap_err();
        assert!(matches!(err, ReclimitError::UnsupportedFormat(ref e) if e == ".parquet"));
    }

    #[test]
    fn test_cell_from_xlsx() {
        assert_eq!(cell_from_xlsx(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(cell_from_xlsx(&Data::Empty), Cell::Missing);
        assert_eq!(cell_from_xlsx(&Data::Bool(true)), Cell::Text("true".into()));
        assert_eq!(
            cell_from_xlsx(&Data::String(String::new())),
            Cell::Missing
        );
    }

    #[test]
    fn test_header_from_row_names_blank_columns() {
        let row = vec![Data::String("a".into()), Data::Empty, Data::Float(2.0)];
        assert_eq!(header_from_row(&row), vec!["a", "column_2", "2"]);
    }
}
