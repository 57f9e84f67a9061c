//! Dataset matching engine.
//!
//! Expected rows are matched greedily, in order, against a pool of actual
//! rows. Each match consumes its actual row. The first expected row that
//! cannot be matched aborts the run with a best-match diagnostic; actual
//! rows left over at the end are reported as unexpected.
//!
//! Matching is first-fit without backtracking. Two expected rows that are
//! both partial matches for the same actual row can fail even though some
//! other assignment would satisfy both.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::failure::{ColumnDiff, Failure};
use crate::row::{CanonicalRow, Row};

/// Maps a canonical cell of an actual row to the form it is compared in.
pub type ConvertFn = Arc<dyn Fn(Option<&str>) -> Option<String> + Send + Sync>;

/// Per-column conversions applied to actual rows before matching.
#[derive(Clone, Default)]
pub struct RowConverter {
    converters: IndexMap<String, ConvertFn>,
}

impl RowConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, column: &str, convert: F) -> Self
    where
        F: Fn(Option<&str>) -> Option<String> + Send + Sync + 'static,
    {
        self.converters.insert(column.to_string(), Arc::new(convert));
        self
    }

    /// Truncate the named columns to their first ten characters, so a
    /// timestamp rendering of a date compares equal to the date itself.
    pub fn date_prefix(mut self, columns: &[&str]) -> Self {
        for column in columns {
            self = self.with(column, |cell| {
                cell.map(|s| s.chars().take(10).collect::<String>())
            });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    pub fn convert(&self, mut row: CanonicalRow) -> CanonicalRow {
        for (column, convert) in &self.converters {
            if row.columns().any(|c| c == column) {
                let converted = convert(row.get(column));
                row.set(column.as_str(), converted);
            }
        }
        row
    }
}

impl fmt::Debug for RowConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowConverter")
            .field("columns", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Verify that `actual` holds exactly the rows in `expected`, as multisets.
pub fn verify(expected: &[Row], actual: &[Row]) -> Result<(), Failure> {
    verify_with(expected, actual, &RowConverter::default())
}

/// Like [`verify`], converting actual rows first.
pub fn verify_with(
    expected: &[Row],
    actual: &[Row],
    converter: &RowConverter,
) -> Result<(), Failure> {
    let expected: Vec<CanonicalRow> = expected
        .iter()
        .map(|row| row.canonical().empty_as_null())
        .collect();
    let actual: Vec<CanonicalRow> = actual
        .iter()
        .map(|row| converter.convert(row.canonical()))
        .collect();
    match_canonical(&expected, &actual)
}

/// The matching algorithm over rows already in canonical form.
pub fn match_canonical(expected: &[CanonicalRow], actual: &[CanonicalRow]) -> Result<(), Failure> {
    if expected.is_empty() {
        if actual.is_empty() {
            return Ok(());
        }
        return Err(Failure::RowCount {
            table: None,
            expected: 0,
            actual: actual.len() as u64,
        });
    }

    let mut pool: Vec<usize> = (0..actual.len()).collect();

    for wanted in expected {
        if pool.is_empty() {
            return Err(Failure::MissingRow {
                expected: wanted.clone(),
                actual_data: actual.to_vec(),
            });
        }

        match pool.iter().position(|&i| is_match(wanted, &actual[i])) {
            Some(slot) => {
                let consumed = pool.remove(slot);
                log::debug!("Matched {wanted} to actual row {consumed}");
            }
            None => {
                let best = best_match(wanted, actual, &pool);
                return Err(Failure::NoMatch {
                    expected: wanted.clone(),
                    best_match: actual[best].clone(),
                    differences: differences(wanted, &actual[best]),
                    actual_data: actual.to_vec(),
                });
            }
        }
    }

    if !pool.is_empty() {
        return Err(Failure::UnexpectedRows {
            rows: pool.iter().map(|&i| actual[i].clone()).collect(),
            actual_data: actual.to_vec(),
        });
    }
    Ok(())
}

/// A column missing from the actual row reads as null.
fn cell_eq(expected: &CanonicalRow, actual: &CanonicalRow, column: &str) -> bool {
    expected.get(column) == actual.get(column)
}

fn is_match(expected: &CanonicalRow, actual: &CanonicalRow) -> bool {
    expected.columns().all(|c| cell_eq(expected, actual, c))
}

fn score(expected: &CanonicalRow, actual: &CanonicalRow) -> usize {
    expected
        .columns()
        .filter(|c| cell_eq(expected, actual, c))
        .count()
}

/// Index of the pool row agreeing on the most columns; earliest wins ties.
fn best_match(expected: &CanonicalRow, actual: &[CanonicalRow], pool: &[usize]) -> usize {
    let mut best = pool[0];
    let mut best_score = score(expected, &actual[best]);
    for &i in &pool[1..] {
        let s = score(expected, &actual[i]);
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    best
}

fn differences(expected: &CanonicalRow, actual: &CanonicalRow) -> Vec<ColumnDiff> {
    expected
        .columns()
        .filter(|c| !cell_eq(expected, actual, c))
        .map(|c| ColumnDiff {
            column: c.to_string(),
            expected: expected.get(c).map(str::to_string),
            actual: actual.get(c).map(str::to_string),
        })
        .collect()
}
