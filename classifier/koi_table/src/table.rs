use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::cell::Cell;
use crate::IDENTIFIER_COLUMN;

/// Errors raised when the input cannot be read as a table at all.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("malformed table: {0}")]
    Csv(#[from] csv::Error),
    #[error("cannot read table: {0}")]
    Io(#[from] std::io::Error),
    #[error("table has no header row")]
    EmptyInput,
    #[error("row {row} has {found} cells but the header has {expected} columns")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// An uploaded table: named columns and one row of cells per candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Build a table from already-classified cells.
    ///
    /// Every row must be as wide as `columns`.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RowWidth {
                    row: i + 1,
                    found: row.len(),
                    expected: columns.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Parse CSV text. Lines starting with `#` are skipped, as in archive exports.
    ///
    /// The identifier column is kept as text so numeric-looking names keep
    /// their spelling.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.is_empty() {
            return Err(TableError::EmptyInput);
        }

        // Keep the first occurrence of a repeated header.
        let mut seen = HashSet::new();
        let mut keep = Vec::with_capacity(headers.len());
        let mut columns = Vec::with_capacity(headers.len());
        for (idx, name) in headers.iter().enumerate() {
            if seen.insert(name.to_string()) {
                keep.push(idx);
                columns.push(name.to_string());
            } else {
                log::warn!("duplicate column '{name}' ignored (keeping first occurrence)");
            }
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let row = keep
                .iter()
                .zip(&columns)
                .map(|(&i, name)| {
                    let raw = record.get(i).unwrap_or("");
                    if name == IDENTIFIER_COLUMN {
                        Cell::parse_text(raw)
                    } else {
                        Cell::parse(raw)
                    }
                })
                .collect();
            rows.push(row);
        }

        log::debug!(
            "read table with {} columns and {} rows",
            columns.len(),
            rows.len()
        );
        Ok(Self { columns, rows })
    }

    pub fn from_csv_str(text: &str) -> Result<Self, TableError> {
        Self::from_csv_reader(text.as_bytes())
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of a named column, in row order.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_header_and_rows() {
        let t = RawTable::from_csv_str("kepoi_name,koi_period,koi_depth\nK1,9.48,615.8\nK2,,874.8\n")
            .unwrap();
        assert_eq!(t.columns(), &["kepoi_name", "koi_period", "koi_depth"]);
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.cell(0, "koi_period"), Some(&Cell::Number(9.48)));
        assert_eq!(t.cell(1, "koi_period"), Some(&Cell::Empty));
        assert_eq!(t.cell(0, "kepoi_name"), Some(&Cell::Text("K1".into())));
    }

    #[test]
    fn skips_comment_preamble() {
        let text = "# This file was produced by the archive\n# COLUMN koi_period: days\nkepoi_name,koi_period\nK1,1.5\n";
        let t = RawTable::from_csv_str(text).unwrap();
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.cell(0, "koi_period").and_then(Cell::as_f64), Some(1.5));
    }

    #[test]
    fn quoted_fields_with_commas_are_one_cell() {
        let t = RawTable::from_csv_str("kepoi_name,koi_comment\nK1,\"NO_COMMENT, really\"\n").unwrap();
        assert_eq!(
            t.cell(0, "koi_comment"),
            Some(&Cell::Text("NO_COMMENT, really".into()))
        );
    }

    #[test]
    fn numeric_identifiers_keep_their_spelling() {
        let t = RawTable::from_csv_str("kepoi_name,koi_period\n0123,1.50\n752.10,2\n,3\n").unwrap();
        assert_eq!(t.cell(0, "kepoi_name"), Some(&Cell::Text("0123".into())));
        assert_eq!(t.cell(1, "kepoi_name"), Some(&Cell::Text("752.10".into())));
        assert_eq!(t.cell(2, "kepoi_name"), Some(&Cell::Empty));
        assert_eq!(t.cell(0, "koi_period"), Some(&Cell::Number(1.5)));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let err = RawTable::from_csv_str("a,b\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, TableError::Csv(_)));
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(
            RawTable::from_csv_str("").unwrap_err(),
            TableError::EmptyInput
        ));
    }

    #[test]
    fn duplicate_headers_keep_first() {
        let t = RawTable::from_csv_str("a,b,a\n1,2,3\n").unwrap();
        assert_eq!(t.columns(), &["a", "b"]);
        assert_eq!(t.cell(0, "a"), Some(&Cell::Number(1.0)));
    }

    #[test]
    fn new_rejects_row_width_mismatch() {
        let err = RawTable::new(vec!["a".into(), "b".into()], vec![vec![Cell::Empty]]).unwrap_err();
        assert!(matches!(
            err,
            TableError::RowWidth {
                row: 1,
                found: 1,
                expected: 2
            }
        ));
    }
}
