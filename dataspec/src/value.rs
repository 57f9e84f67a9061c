//! Cell values and bindable parameters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single cell of a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for `Null` and for the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret a numeric scalar (as returned by `count(*)` or `nextval`) as an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The string form used for comparison; `None` for null.
    ///
    /// Numbers lose trailing fractional zeros, so `1.00`, `1.0` and `1`
    /// canonicalize to the same text.
    pub fn canonical(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Decimal(d) => Some(d.normalize().to_string()),
            Value::Text(s) => Some(canonical_text(s)),
            other => Some(canonical_text(&other.to_string())),
        }
    }
}

/// Strip trailing fractional zeros from a plain decimal literal.
///
/// Anything that is not `[+-]digits.digits` is returned unchanged.
pub fn canonical_text(text: &str) -> String {
    let Some((whole, fraction)) = text.split_once('.') else {
        return text.to_string();
    };
    let digits = whole.strip_prefix(['-', '+']).unwrap_or(whole);
    let is_plain_number = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit());
    if !is_plain_number {
        return text.to_string();
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.3f")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// The temporal coercions a column can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalKind {
    Date,
    Timestamp,
}

impl TemporalKind {
    /// Parse an ISO-8601 string into the matching [`Value`].
    ///
    /// Dates are `YYYY-MM-DD`; timestamps are RFC 3339 with an offset and are
    /// normalized to UTC.
    pub fn parse(self, column: &str, text: &str) -> Result<Value> {
        let malformed = || Error::MalformedValue {
            column: column.to_string(),
            value: text.to_string(),
            kind: self,
        };
        match self {
            TemporalKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| malformed()),
            TemporalKind::Timestamp => DateTime::parse_from_rfc3339(text)
                .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|_| malformed()),
        }
    }

    fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (TemporalKind::Date, Value::Date(_)) | (TemporalKind::Timestamp, Value::Timestamp(_))
        )
    }

    /// Coerce a cell; blanks and values already of this kind pass through.
    pub fn coerce(self, column: &str, value: Value) -> Result<Value> {
        if value.is_blank() || self.matches(&value) {
            return Ok(value);
        }
        let text = value.to_string();
        self.parse(column, &text)
    }
}

impl fmt::Display for TemporalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalKind::Date => write!(f, "date"),
            TemporalKind::Timestamp => write!(f, "timestamp"),
        }
    }
}

impl FromStr for TemporalKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "date" => Ok(TemporalKind::Date),
            "timestamp" => Ok(TemporalKind::Timestamp),
            other => Err(Error::invalid_input(format!(
                "unknown coercion {other:?}, expected date or timestamp"
            ))),
        }
    }
}

/// A value that can be bound to a positional statement parameter.
///
/// There is no null variant: binding a null fails before it
/// reaches the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Decimal(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl Param {
    /// Convert a cell into a parameter, naming the column if the cell is null.
    pub fn from_value(column: Option<&str>, value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => {
                return Err(Error::UnsupportedParameter {
                    column: column.map(str::to_string),
                })
            }
            Value::Bool(b) => Param::Bool(*b),
            Value::Int(i) => Param::BigInt(*i),
            Value::Float(f) => Param::Double(*f),
            Value::Decimal(d) => Param::Decimal(*d),
            Value::Text(s) => Param::Text(s.clone()),
            Value::Date(d) => Param::Date(*d),
            Value::Time(t) => Param::Time(*t),
            Value::Timestamp(ts) => Param::Timestamp(*ts),
        })
    }
}

impl TryFrom<&Value> for Param {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        Param::from_value(None, value)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::BigInt(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}
