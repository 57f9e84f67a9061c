//! Capture table contents for comparison across runners.

use dataspec::{CanonicalRow, Database, Persistence, RowConverter};
use serde::Serialize;

/// The canonical contents of some columns of a table, sorted so that two
/// snapshots of the same multiset compare equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<CanonicalRow>,
}

impl TableSnapshot {
    /// Read `columns` of `table`.
    pub fn capture<P: Persistence>(
        db: &Database<P>,
        table: &str,
        columns: &[&str],
    ) -> dataspec::Result<Self> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let mut rows = db.select(table, &columns, &RowConverter::default())?;
        rows.sort_by_cached_key(|row| row.to_string());
        Ok(Self {
            table: table.to_string(),
            columns,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows present in one snapshot and not the other, as
    /// `(only_in_self, only_in_other)`.
    pub fn diff(&self, other: &TableSnapshot) -> (Vec<CanonicalRow>, Vec<CanonicalRow>) {
        let mut theirs = other.rows.clone();
        let mut only_ours = Vec::new();
        for row in &self.rows {
            match theirs.iter().position(|r| r == row) {
                Some(i) => {
                    theirs.remove(i);
                }
                None => only_ours.push(row.clone()),
            }
        }
        (only_ours, theirs)
    }
}
