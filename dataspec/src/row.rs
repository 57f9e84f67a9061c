//! Rows and datasets.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A row as it comes out of a data table: every cell is a string.
pub type RawRow = IndexMap<String, String>;

/// An ordered sequence of rows, compared as a multiset.
pub type Dataset = Vec<Row>;

/// An ordered mapping from column name to [`Value`].
///
/// Overwriting a column keeps its original position, so column order is the
/// order in which columns first appeared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(IndexMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row from raw string cells.
    pub fn from_raw(raw: &RawRow) -> Self {
        raw.iter()
            .map(|(k, v)| (k.clone(), Value::Text(v.clone())))
            .collect()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Set a column, returning the previous value if there was one.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy without empty-string cells, used for inserts so that engine
    /// defaults apply to unspecified columns.
    pub fn without_empty_text(&self) -> Row {
        self.iter()
            .filter(|(_, v)| v.as_text() != Some(""))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// The comparison form of this row.
    pub fn canonical(&self) -> CanonicalRow {
        CanonicalRow(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.canonical()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

impl From<&RawRow> for Row {
    fn from(raw: &RawRow) -> Self {
        Row::from_raw(raw)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_row(f, self.0.iter().map(|(k, v)| (k.as_str(), v.to_string())))
    }
}

/// A row reduced to canonical strings; `None` is null.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalRow(IndexMap<String, Option<String>>);

impl CanonicalRow {
    /// The canonical cell, `None` for both null and a missing column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(|v| v.as_deref())
    }

    pub fn set(&mut self, column: impl Into<String>, value: Option<String>) {
        self.0.insert(column.into(), value);
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace empty strings with null.
    pub fn empty_as_null(mut self) -> Self {
        for value in self.0.values_mut() {
            if value.as_deref() == Some("") {
                *value = None;
            }
        }
        self
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for CanonicalRow {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        CanonicalRow(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Null and the empty string print the same.
impl fmt::Display for CanonicalRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_row(
            f,
            self.0.iter().map(|(k, v)| {
                let text = match v.as_deref() {
                    None | Some("") => "null".to_string(),
                    Some(s) => s.to_string(),
                };
                (k.as_str(), text)
            }),
        )
    }
}

fn write_row<'a>(
    f: &mut fmt::Formatter<'_>,
    cells: impl Iterator<Item = (&'a str, String)>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (column, value)) in cells.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{column}={value}")?;
    }
    write!(f, "}}")
}
