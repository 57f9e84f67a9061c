use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};

use crate::config::DatabaseSettings;
use crate::error::{Error, Result};
use crate::persistence::Persistence;
use crate::row::{Dataset, Row};
use crate::value::{Param, Value};

pub const DRIVER: &str = "sqlite";

/// A single SQLite connection. Released when the session is dropped.
#[derive(Debug)]
pub struct SqliteSession {
    url: String,
    conn: Option<Connection>,
}

impl SqliteSession {
    /// Open the database named by `settings.url`, a file path or `:memory:`.
    pub fn open(settings: &DatabaseSettings) -> Result<Self> {
        if !settings.driver.eq_ignore_ascii_case(DRIVER) {
            return Err(Error::UnsupportedDriver {
                driver: settings.driver.clone(),
            });
        }
        let conn = Connection::open(&settings.url).map_err(|e| Error::Connection {
            url: settings.url.clone(),
            source: Box::new(e),
        })?;
        log::info!("Opened SQLite database {}", settings.url);
        Ok(Self {
            url: settings.url.clone(),
            conn: Some(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&DatabaseSettings::sqlite(":memory:"))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::unsupported(format!("session for {} is closed", self.url)))
    }

    /// Run one or more statements without parameters, e.g. a DDL script.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        log::debug!("Executing batch: {sql}");
        self.conn()?
            .execute_batch(sql)
            .map_err(|e| Error::persistence("Error executing DB statement.", e))
    }

    /// Release the connection, reporting any error from closing it.
    pub fn close(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => {
                conn.close()
                    .map_err(|(_, e)| Error::persistence("Error closing DB connection.", e))?;
                log::info!("Closed SQLite database {}", self.url);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                log::warn!("Failed to close SQLite database {}: {e}", self.url);
            } else {
                log::info!("Released SQLite database {}", self.url);
            }
        }
    }
}

impl Persistence for SqliteSession {
    fn update(&self, sql: &str, params: &[Param]) -> Result<usize> {
        log::debug!("Executing: {sql} {params:?}");
        self.conn()?
            .execute(sql, rusqlite::params_from_iter(params.iter()))
            .map_err(|e| Error::persistence("Error executing DB statement.", e))
    }

    fn scalar_query(&self, sql: &str) -> Result<Value> {
        log::debug!("Querying: {sql}");
        self.conn()?
            .query_row(sql, [], |row| row.get_ref(0).map(value_from_ref))
            .map_err(|e| Error::persistence("Error executing DB query.", e))
    }

    fn rows_query(&self, sql: &str, columns: &[String]) -> Result<Dataset> {
        log::debug!("Querying: {sql}");
        let query_error = |e: rusqlite::Error| Error::persistence("Error executing DB query.", e);
        let mut stmt = self.conn()?.prepare(sql).map_err(query_error)?;
        let mut rows = stmt.query([]).map_err(query_error)?;
        let mut dataset = Dataset::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut values = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let value = row.get_ref(i).map_err(query_error)?;
                values.insert(column.as_str(), value_from_ref(value));
            }
            dataset.push(values);
        }
        Ok(dataset)
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
    }
}

impl ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Param::Bool(b) => b.to_sql(),
            Param::TinyInt(i) => i.to_sql(),
            Param::SmallInt(i) => i.to_sql(),
            Param::Int(i) => i.to_sql(),
            Param::BigInt(i) => i.to_sql(),
            Param::Real(f) => f.to_sql(),
            Param::Double(f) => f.to_sql(),
            Param::Decimal(d) => Ok(ToSqlOutput::from(d.normalize().to_string())),
            Param::Date(d) => Ok(ToSqlOutput::from(Value::Date(*d).to_string())),
            Param::Time(t) => Ok(ToSqlOutput::from(Value::Time(*t).to_string())),
            Param::Timestamp(ts) => Ok(ToSqlOutput::from(Value::Timestamp(*ts).to_string())),
            Param::Text(s) => s.to_sql(),
        }
    }
}
