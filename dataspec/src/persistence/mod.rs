use crate::error::Result;
use crate::row::Dataset;
use crate::value::{Param, Value};

pub mod sqlite;

/// The store a [`Database`](crate::db::Database) reads from and writes to.
///
/// One implementation owns one session. Calls are made from a single thread
/// and in order.
pub trait Persistence {
    /// Execute a statement with positional parameters. Returns the number of
    /// affected rows.
    fn update(&self, sql: &str, params: &[Param]) -> Result<usize>;

    /// Run a query and return the first column of its first row.
    fn scalar_query(&self, sql: &str) -> Result<Value>;

    /// Run a query and return every row, keyed by `columns` in result order.
    fn rows_query(&self, sql: &str, columns: &[String]) -> Result<Dataset>;
}

impl<P: Persistence + ?Sized> Persistence for &P {
    fn update(&self, sql: &str, params: &[Param]) -> Result<usize> {
        (**self).update(sql, params)
    }

    fn scalar_query(&self, sql: &str) -> Result<Value> {
        (**self).scalar_query(sql)
    }

    fn rows_query(&self, sql: &str, columns: &[String]) -> Result<Dataset> {
        (**self).rows_query(sql, columns)
    }
}
