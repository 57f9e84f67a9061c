//! Assertion failures.
//!
//! A [`Failure`] is the outcome of a check that ran to completion and did not
//! hold. It carries enough context to reproduce the discrepancy without
//! re-running the check.

use std::fmt;

use serde::Serialize;

use crate::row::CanonicalRow;

/// One column on which an expected row and its best match disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDiff {
    pub column: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl fmt::Display for ColumnDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} expected: {}, but was: {}",
            self.column,
            render_cell(self.expected.as_deref()),
            render_cell(self.actual.as_deref())
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// A table that should have a given number of rows does not.
    RowCount {
        table: Option<String>,
        expected: u64,
        actual: u64,
    },

    /// An expected row had no candidates left to match against.
    MissingRow {
        expected: CanonicalRow,
        actual_data: Vec<CanonicalRow>,
    },

    /// No remaining actual row matched an expected row.
    NoMatch {
        expected: CanonicalRow,
        best_match: CanonicalRow,
        differences: Vec<ColumnDiff>,
        actual_data: Vec<CanonicalRow>,
    },

    /// Actual rows were left over after every expected row matched.
    UnexpectedRows {
        rows: Vec<CanonicalRow>,
        actual_data: Vec<CanonicalRow>,
    },

    /// Polling ran out of attempts before the row count converged.
    RowCountNotConverged {
        table: String,
        expected: u64,
        actual: u64,
        attempts: u32,
    },

    /// Two documents differ after normalization.
    DocumentMismatch {
        template: String,
        expected: String,
        actual: String,
    },
}

impl Failure {
    /// Get the failure type as a stable string.
    pub fn error_type(&self) -> &'static str {
        match self {
            Failure::RowCount { .. } => "row_count",
            Failure::MissingRow { .. } => "missing_row",
            Failure::NoMatch { .. } => "no_match",
            Failure::UnexpectedRows { .. } => "unexpected_rows",
            Failure::RowCountNotConverged { .. } => "row_count_not_converged",
            Failure::DocumentMismatch { .. } => "document_mismatch",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::RowCount {
                table: Some(table),
                expected,
                actual,
            } => write!(
                f,
                "Row count in table {table} expected {expected}, but was {actual}."
            ),
            Failure::RowCount {
                table: None,
                expected,
                actual,
            } => write!(f, "Row count expected {expected}, but was {actual}."),
            Failure::MissingRow {
                expected,
                actual_data,
            } => {
                writeln!(f, "Missing row:")?;
                writeln!(f, "{expected}")?;
                write_dump(f, actual_data)
            }
            Failure::NoMatch {
                expected,
                best_match,
                differences,
                actual_data,
            } => {
                writeln!(f, "No match found for expected row:")?;
                writeln!(f, "{expected}")?;
                writeln!(f, " Best match:")?;
                writeln!(f, "{best_match}")?;
                writeln!(f, " Differences:")?;
                for diff in differences {
                    writeln!(f, "  {diff}")?;
                }
                write_dump(f, actual_data)
            }
            Failure::UnexpectedRows { rows, actual_data } => {
                writeln!(f, "Unexpected row(s):")?;
                for row in rows {
                    writeln!(f, "{row}")?;
                }
                write_dump(f, actual_data)
            }
            Failure::RowCountNotConverged {
                table,
                expected,
                actual,
                attempts,
            } => write!(
                f,
                "Row count in table {table} expected {expected}, but was {actual}. \
                 Gave up after {attempts} attempts."
            ),
            Failure::DocumentMismatch {
                template,
                expected,
                actual,
            } => {
                writeln!(f, "Document does not match template ({template}:1)")?;
                writeln!(f, " Expected:")?;
                writeln!(f, "{expected}")?;
                writeln!(f, " Actual:")?;
                write!(f, "{actual}")
            }
        }
    }
}

impl std::error::Error for Failure {}

fn render_cell(value: Option<&str>) -> &str {
    match value {
        None | Some("") => "null",
        Some(v) => v,
    }
}

fn write_dump(f: &mut fmt::Formatter<'_>, rows: &[CanonicalRow]) -> fmt::Result {
    write!(f, " Actual DB data:")?;
    if rows.is_empty() {
        return write!(f, "\n(no rows)");
    }
    for row in rows {
        write!(f, "\n{row}")?;
    }
    Ok(())
}
