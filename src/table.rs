//! In-memory table: an ordered header plus fixed-width rows of untyped cells.

use crate::error::{ReclimitError, Result};
use std::collections::HashSet;
use std::fmt;

/// Integral numbers up to this magnitude render without a fractional part.
const INTEGRAL_RENDER_LIMIT: f64 = 1e15;

/// A single cell as read from the source file.
///
/// Cells carry no column type. A number read from a spreadsheet stays a number, everything read
/// from a delimited file is text, and the evaluator decides per condition how to interpret it.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Build a cell from raw delimited text; the empty string becomes `Missing`.
    pub fn from_text(s: &str) -> Self {
        if s.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Textual rendering used by equality and substring conditions and by the CSV writer.
    pub fn render(&self) -> String {
        match self {
            Cell::Number(n) => render_number(*n),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }

    /// Numeric interpretation of the cell, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number(s),
            Cell::Missing => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => f.write_str(&render_number(*n)),
            Cell::Text(s) => f.write_str(s),
            Cell::Missing => Ok(()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::from_text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

fn render_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < INTEGRAL_RENDER_LIMIT {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse a number the way a user would type it: surrounding whitespace is ignored.
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

pub type Row = Vec<Cell>;

/// An ordered header plus rows. Every row has exactly `header.len()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create a table, padding short rows with `Missing`.
    ///
    /// Fails when a column name repeats or a row is wider than the header.
    pub fn new(header: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(header.len());
        if let Some(name) = header.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ReclimitError::Validation(format!(
                "duplicate column name {:?}",
                name
            )));
        }
        let width = header.len();
        let mut table = Self {
            header,
            rows: Vec::with_capacity(rows.len()),
        };
        for (idx, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(ReclimitError::Validation(format!(
                    "row {} has {} cells but the header has {} columns",
                    idx + 1,
                    row.len(),
                    width
                )));
            }
            row.resize(width, Cell::Missing);
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Convenience constructor for text-only tables (tests, demos).
    pub fn from_strings<H, R, C>(header: H, rows: R) -> Result<Self>
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let header = header.into_iter().map(Into::into).collect();
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|c| Cell::from_text(c.as_ref())).collect())
            .collect();
        Self::new(header, rows)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column in the header (first match).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().filter_map(move |r| r.get(column))
    }

    /// Overwrite a single cell. Out-of-range positions are ignored.
    pub(crate) fn set_cell(&mut self, row: usize, column: usize, value: Cell) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value;
        }
    }

    /// Keep only the first `n` rows.
    pub(crate) fn truncate(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    /// A table with the same header and the given rows (already in header order).
    pub(crate) fn with_rows(&self, rows: Vec<Row>) -> Self {
        Self {
            header: self.header.clone(),
            rows,
        }
    }

    /// Rows rendered as strings, mainly for assertions and previews.
    pub fn to_string_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| r.iter().map(Cell::render).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_numbers() {
        assert_eq!(Cell::Number(10.0).render(), "10");
        assert_eq!(Cell::Number(-3.0).render(), "-3");
        assert_eq!(Cell::Number(2.5).render(), "2.5");
        assert_eq!(Cell::Number(1e20).render(), "100000000000000000000");
        assert_eq!(Cell::Missing.render(), "");
        assert_eq!(Cell::Text("abc".to_string()).render(), "abc");
    }

    #[test]
    fn test_as_number() {
        assert_eq!(Cell::from_text(" 42 ").as_number(), Some(42.0));
        assert_eq!(Cell::from_text("1e3").as_number(), Some(1000.0));
        assert_eq!(Cell::from_text("abc").as_number(), None);
        assert_eq!(Cell::Missing.as_number(), None);
        assert_eq!(Cell::Number(7.5).as_number(), Some(7.5));
    }

    #[test]
    fn test_from_text_empty_is_missing() {
        assert!(Cell::from_text("").is_missing());
        assert!(!Cell::from_text(" ").is_missing());
    }

    #[test]
    fn test_duplicate_column_names_rejected() {
        let err = Table::from_strings(["a", "b", "a"], [["1", "2", "3"]]).unwrap_err();
        assert!(matches!(err, ReclimitError::Validation(_)));
        assert!(err.to_string().contains("\"a\""), "{}", err);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = Table::from_strings(["a", "b", "c"], [vec!["1"], vec!["1", "2", "3"]]).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.rows()[0].len(), 3);
        assert!(table.rows()[0][2].is_missing());
    }

    #[test]
    fn test_wide_rows_are_rejected() {
        let err = Table::from_strings(["a"], [vec!["1", "2"]]).unwrap_err();
        assert!(err.to_string().contains("row 1 has 2 cells"));
    }

    #[test]
    fn test_column_lookup() {
        let table = Table::from_strings(["name", "age"], [vec!["Alice", "30"]]).unwrap();
        assert_eq!(table.column_index("age"), Some(1));
        assert_eq!(table.column_index("missing"), None);
        let ages: Vec<String> = table.column(1).map(Cell::render).collect();
        assert_eq!(ages, vec!["30"]);
    }

    #[test]
    fn test_set_cell_and_truncate() {
        let mut table =
            Table::from_strings(["x"], [vec!["1"], vec!["2"], vec!["3"]]).unwrap();
        table.set_cell(1, 0, Cell::Text("two".to_string()));
        table.set_cell(9, 0, Cell::Text("ignored".to_string()));
        table.truncate(2);
        assert_eq!(table.to_string_rows(), vec![vec!["1"], vec!["two"]]);
    }
}
