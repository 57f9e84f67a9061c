//! SQL facade over a [`Persistence`] session.
//!
//! Tables are always addressed as `<schema>.<table>`.

use crate::config::{Dialect, Settings};
use crate::error::{Error, Result};
use crate::failure::Failure;
use crate::matching::{self, RowConverter};
use crate::persistence::sqlite::SqliteSession;
use crate::persistence::Persistence;
use crate::poll::{self, PollOutcome, PollPolicy, Sleeper, ThreadSleeper};
use crate::row::{CanonicalRow, Dataset, Row};
use crate::value::{Param, Value};

pub struct Database<P> {
    session: P,
    schema: String,
    dialect: Dialect,
    poll: PollPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl<P: Persistence> Database<P> {
    pub fn new(session: P, schema: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            session,
            schema: schema.into(),
            dialect,
            poll: PollPolicy::default(),
            sleeper: Box::new(ThreadSleeper::new()),
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn session(&self) -> &P {
        &self.session
    }

    pub fn into_session(self) -> P {
        self.session
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// `<schema>.<name>`
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }

    pub fn execute_update(&self, sql: &str, params: &[Param]) -> Result<usize> {
        self.session.update(sql, params)
    }

    /// Delete every row of each table, in order.
    pub fn delete(&self, tables: &[&str]) -> Result<()> {
        for table in tables {
            let sql = format!("delete from {}", self.qualify(table));
            let deleted = self.session.update(&sql, &[])?;
            log::debug!("Deleted {deleted} rows from {table}");
        }
        Ok(())
    }

    /// Insert one row. Empty-string cells are left out so the column
    /// default applies. Null cells are rejected.
    pub fn insert(&self, table: &str, row: &Row) -> Result<usize> {
        let row = row.without_empty_text();
        let table = self.qualify(table);
        if row.is_empty() {
            return self
                .session
                .update(&format!("insert into {table} default values"), &[]);
        }
        let params = row
            .iter()
            .map(|(column, value)| Param::from_value(Some(column), value))
            .collect::<Result<Vec<_>>>()?;
        let columns = row.columns().collect::<Vec<_>>().join(", ");
        let placeholders = vec!["?"; params.len()].join(", ");
        let sql = format!("insert into {table} ({columns}) values ({placeholders})");
        self.session.update(&sql, &params)
    }

    pub fn insert_all(&self, table: &str, rows: &[Row]) -> Result<usize> {
        let mut inserted = 0;
        for row in rows {
            inserted += self.insert(table, row)?;
        }
        log::debug!("Inserted {inserted} rows into {table}");
        Ok(inserted)
    }

    pub fn select_count(&self, table: &str) -> Result<u64> {
        let sql = format!("select count(*) from {}", self.qualify(table));
        let value = self.session.scalar_query(&sql)?;
        as_count(&value)
    }

    /// The canonical, converted contents of the named columns.
    pub fn select(
        &self,
        table: &str,
        columns: &[String],
        converter: &RowConverter,
    ) -> Result<Vec<CanonicalRow>> {
        Ok(self
            .select_rows(table, columns)?
            .iter()
            .map(|row| converter.convert(row.canonical()))
            .collect())
    }

    fn select_rows(&self, table: &str, columns: &[String]) -> Result<Dataset> {
        let sql = format!("select {} from {}", columns.join(", "), self.qualify(table));
        self.session.rows_query(&sql, columns)
    }

    pub fn next_sequence_value(&self, sequence: &str) -> Result<i64> {
        let sql = match self.dialect {
            Dialect::Oracle => format!("select {}.nextval from dual", self.qualify(sequence)),
            Dialect::Postgres | Dialect::H2 => {
                format!("select nextval('{}')", self.qualify(sequence))
            }
            Dialect::Sqlite => {
                return Err(Error::unsupported("SQLite has no sequences"));
            }
        };
        let value = self.session.scalar_query(&sql)?;
        value.as_i64().ok_or_else(|| {
            Error::invalid_input(format!("sequence {sequence} returned {value}, not a number"))
        })
    }

    /// Poll the row count of `table` until it equals `expected`.
    pub fn await_row_count(&self, table: &str, expected: u64) -> Result<()> {
        let awaiting = format!("row count of table {table}");
        let outcome = poll::poll_until(
            &self.poll,
            self.sleeper.as_ref(),
            &awaiting,
            || self.select_count(table),
            |count| *count == expected,
        )?;
        match outcome {
            PollOutcome::Converged { attempts, .. } => {
                log::debug!("Row count of {table} reached {expected} after {attempts} attempts");
                Ok(())
            }
            PollOutcome::Exhausted { last, attempts } => Err(Failure::RowCountNotConverged {
                table: table.to_string(),
                expected,
                actual: last,
                attempts,
            }
            .into()),
        }
    }

    /// Verify the contents of `table` against `expected`.
    pub fn verify(&self, table: &str, expected: &[Row]) -> Result<()> {
        self.verify_with(table, expected, &RowConverter::default())
    }

    /// Like [`verify`](Self::verify), converting the actual rows first.
    ///
    /// Only the columns of the first expected row are read. An empty
    /// expectation checks that the table is empty.
    pub fn verify_with(&self, table: &str, expected: &[Row], converter: &RowConverter) -> Result<()> {
        let Some(first) = expected.first() else {
            let actual = self.select_count(table)?;
            if actual != 0 {
                return Err(Failure::RowCount {
                    table: Some(table.to_string()),
                    expected: 0,
                    actual,
                }
                .into());
            }
            return Ok(());
        };
        let columns: Vec<String> = first.columns().map(str::to_string).collect();
        let actual = self.select_rows(table, &columns)?;
        matching::verify_with(expected, &actual, converter)?;
        log::debug!("Verified {} rows in {table}", expected.len());
        Ok(())
    }
}

fn as_count(value: &Value) -> Result<u64> {
    value
        .as_i64()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| Error::invalid_input(format!("row count {value} is not a count")))
}

impl Database<SqliteSession> {
    /// Open a session from settings, with the configured schema, dialect and
    /// poll policy.
    pub fn open(settings: &Settings) -> Result<Self> {
        let session = SqliteSession::open(&settings.database)?;
        Ok(Database::new(session, &settings.database.schema, settings.database.dialect)
            .with_poll_policy(settings.poll_policy()))
    }

    /// Open a database, run `f`, and release the session whatever the
    /// outcome.
    pub fn scoped<T>(settings: &Settings, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let db = Self::open(settings)?;
        let result = f(&db);
        let closed = db.close();
        match result {
            Ok(value) => closed.map(|()| value),
            Err(e) => {
                if let Err(close_err) = closed {
                    log::warn!("Failed to close session after error: {close_err}");
                }
                Err(e)
            }
        }
    }

    pub fn close(self) -> Result<()> {
        self.session.close()
    }
}
