//! Tabular input for expected and inserted rows.
//!
//! Data tables are written as pipe tables, one row per line:
//!
//! ```text
//! | id | name  | comment |
//! | 1  | Alice |         |
//! | 2  | Bob   | vip     |
//! ```
//!
//! The first row is the header. Blank lines and lines starting with `#` are
//! skipped. An empty cell means "not specified" when inserting and "null"
//! when verifying. Write `\|` for a literal pipe inside a cell and `\\`
//! for a backslash; any other backslash is kept as written.

use std::path::Path;

use fs_err as fs;

use crate::error::{Error, Result};
use crate::row::RawRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Build a table from a header and rows of cells.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if header.is_empty() {
            return Err(Error::invalid_input("data table has no header"));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                return Err(Error::invalid_input(format!(
                    "data row {} has {} cells, header has {}",
                    i + 1,
                    row.len(),
                    header.len()
                )));
            }
        }
        Ok(Self { header, rows })
    }

    /// Parse a pipe table.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let header = match lines.next() {
            Some(line) => split_cells(line)?,
            None => return Err(Error::invalid_input("data table is empty")),
        };
        let rows = lines.map(split_cells).collect::<Result<Vec<_>>>()?;
        Self::new(header, rows)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        log::debug!("Parsing data table from {}", path.as_ref().display());
        Self::parse(&text)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One raw row per data line, keyed by the header.
    pub fn as_maps(&self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|cells| {
                self.header
                    .iter()
                    .cloned()
                    .zip(cells.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// The single data row of a one-row table.
    pub fn as_row(&self) -> Result<RawRow> {
        if self.rows.len() != 1 {
            return Err(Error::invalid_input(format!(
                "Must provide exactly 1 data row, got {}.",
                self.rows.len()
            )));
        }
        Ok(self.as_maps().remove(0))
    }
}

fn split_cells(line: &str) -> Result<Vec<String>> {
    let malformed = || {
        Error::invalid_input(format!("data table line must start and end with '|': {line}"))
    };
    let rest = line.strip_prefix('|').ok_or_else(malformed)?;

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            '\\' => match chars.next() {
                Some(escaped @ ('|' | '\\')) => cell.push(escaped),
                Some(other) => {
                    cell.push('\\');
                    cell.push(other);
                }
                None => cell.push('\\'),
            },
            _ => cell.push(c),
        }
    }
    if !cell.is_empty() {
        return Err(malformed());
    }
    Ok(cells)
}
