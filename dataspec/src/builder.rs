//! Typed row builder.
//!
//! Turns raw string rows into rows ready for insertion. For every row the
//! steps run in a fixed order:
//!
//! 1. seed with the raw cells,
//! 2. fill defaults for columns that are absent or empty,
//! 3. run providers, which overwrite,
//! 4. coerce date columns, then timestamp columns.

use indexmap::IndexMap;

use crate::error::Result;
use crate::row::{RawRow, Row};
use crate::value::{TemporalKind, Value};

/// Computes a column value from the raw row it is being built from.
pub type ProviderFn = Box<dyn Fn(&RawRow) -> Value>;

enum Binding {
    Fixed(Value),
    Computed(ProviderFn),
}

impl Binding {
    fn resolve(&self, raw: &RawRow) -> Value {
        match self {
            Binding::Fixed(v) => v.clone(),
            Binding::Computed(f) => f(raw),
        }
    }
}

/// Builds a single row.
#[derive(Debug, Clone, Default)]
pub struct RowBuilder {
    row: Row,
}

impl RowBuilder {
    pub fn create() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: &RawRow) -> Self {
        Self {
            row: Row::from_raw(raw),
        }
    }

    /// Set `column` only if it is absent or an empty cell.
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        let unspecified = match self.row.get(column) {
            None => true,
            Some(v) => v.as_text() == Some(""),
        };
        if unspecified {
            self.row.insert(column, value);
        }
        self
    }

    /// Set `column`, replacing whatever is there.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.row.insert(column, value);
        self
    }

    pub fn as_date(self, columns: &[&str]) -> Result<Self> {
        self.coerce(TemporalKind::Date, columns)
    }

    pub fn as_timestamp(self, columns: &[&str]) -> Result<Self> {
        self.coerce(TemporalKind::Timestamp, columns)
    }

    fn coerce<S: AsRef<str>>(mut self, kind: TemporalKind, columns: &[S]) -> Result<Self> {
        for column in columns {
            let column = column.as_ref();
            if let Some(value) = self.row.get(column) {
                let coerced = kind.coerce(column, value.clone())?;
                self.row.insert(column, coerced);
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Row {
        self.row
    }
}

/// Builds every row of a data table with the same defaults, providers and
/// coercions.
#[derive(Default)]
pub struct RowsBuilder {
    defaults: IndexMap<String, Value>,
    providers: IndexMap<String, Binding>,
    dates: Vec<String>,
    timestamps: Vec<String>,
}

impl RowsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `column` when a row does not specify one.
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.defaults.insert(column.to_string(), value.into());
        self
    }

    /// Fixed value for `column`, overriding the row.
    pub fn provide(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.providers
            .insert(column.to_string(), Binding::Fixed(value.into()));
        self
    }

    /// Computed value for `column`, overriding the row. The function sees the
    /// raw row, so it can derive the value from other columns.
    pub fn provide_with<F>(mut self, column: &str, provider: F) -> Self
    where
        F: Fn(&RawRow) -> Value + 'static,
    {
        self.providers
            .insert(column.to_string(), Binding::Computed(Box::new(provider)));
        self
    }

    pub fn as_date(mut self, columns: &[&str]) -> Self {
        self.dates.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn as_timestamp(mut self, columns: &[&str]) -> Self {
        self.timestamps.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Build one row. The raw row is not modified.
    pub fn build_row(&self, raw: &RawRow) -> Result<Row> {
        let mut builder = RowBuilder::from_raw(raw);
        for (column, value) in &self.defaults {
            builder = builder.with(column, value.clone());
        }
        for (column, binding) in &self.providers {
            builder = builder.set(column, binding.resolve(raw));
        }
        builder
            .coerce(TemporalKind::Date, &self.dates)?
            .coerce(TemporalKind::Timestamp, &self.timestamps)
            .map(RowBuilder::build)
    }

    /// Build all rows, preserving their order.
    pub fn build(&self, data: &[RawRow]) -> Result<Vec<Row>> {
        data.iter().map(|raw| self.build_row(raw)).collect()
    }
}
