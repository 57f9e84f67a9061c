//! Fakes for the two seams of the library: the persistence store and the
//! poll sleeper.
//!
//! `RecordingSleeper` and `ScriptedStore` have twins in the `testutil`
//! module of dataspec's own unit tests; keep them in step.

use dataspec::poll::Interrupted;
use dataspec::{Dataset, Param, Persistence, Result, Sleeper, Value};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Records requested sleeps instead of sleeping. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
    interrupt_after: Option<usize>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` sleeps through, then interrupt every later one.
    pub fn interrupting_after(n: usize) -> Self {
        Self {
            interrupt_after: Some(n),
            ..Self::default()
        }
    }

    /// Every sleep that went through, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> std::result::Result<(), Interrupted> {
        let mut sleeps = self.sleeps.lock().unwrap_or_else(PoisonError::into_inner);
        if self.interrupt_after.is_some_and(|n| sleeps.len() >= n) {
            return Err(Interrupted);
        }
        sleeps.push(duration);
        Ok(())
    }
}

/// A store that answers from a script and records what it was asked.
///
/// Scalars are served in order and the last one repeats. Every rows query
/// returns the configured rows, narrowed to the requested columns; a
/// column a row lacks comes back as null.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    scalars: RefCell<VecDeque<Value>>,
    rows: Dataset,
    updates: RefCell<Vec<(String, Vec<Param>)>>,
    queries: RefCell<Vec<String>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalars(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.scalars = RefCell::new(values.into_iter().collect());
        self
    }

    pub fn with_rows(mut self, rows: Dataset) -> Self {
        self.rows = rows;
        self
    }

    /// Statements passed to `update`, with their parameters.
    pub fn updates(&self) -> Vec<(String, Vec<Param>)> {
        self.updates.borrow().clone()
    }

    /// SQL of every scalar and rows query, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }
}

impl Persistence for ScriptedStore {
    fn update(&self, sql: &str, params: &[Param]) -> Result<usize> {
        self.updates
            .borrow_mut()
            .push((sql.to_string(), params.to_vec()));
        Ok(1)
    }

    fn scalar_query(&self, sql: &str) -> Result<Value> {
        self.queries.borrow_mut().push(sql.to_string());
        let mut scalars = self.scalars.borrow_mut();
        let value = if scalars.len() > 1 {
            scalars.pop_front()
        } else {
            scalars.front().cloned()
        };
        Ok(value.unwrap_or_default())
    }

    fn rows_query(&self, sql: &str, columns: &[String]) -> Result<Dataset> {
        self.queries.borrow_mut().push(sql.to_string());
        Ok(self
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.as_str(), row.get(c).cloned().unwrap_or_default()))
                    .collect()
            })
            .collect())
    }
}

/// Wraps a real store so that rows appear to land late.
///
/// The first `stale_reads` scalar queries answer `stale` instead of asking
/// the inner store. Updates and rows queries pass straight through.
#[derive(Debug)]
pub struct LaggingStore<P> {
    inner: P,
    stale: Value,
    stale_reads: usize,
    reads: Cell<usize>,
}

impl<P: Persistence> LaggingStore<P> {
    pub fn new(inner: P, stale: impl Into<Value>, stale_reads: usize) -> Self {
        Self {
            inner,
            stale: stale.into(),
            stale_reads,
            reads: Cell::new(0),
        }
    }

    /// Number of scalar queries answered so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Persistence> Persistence for LaggingStore<P> {
    fn update(&self, sql: &str, params: &[Param]) -> Result<usize> {
        self.inner.update(sql, params)
    }

    fn scalar_query(&self, sql: &str) -> Result<Value> {
        let read = self.reads.get();
        self.reads.set(read + 1);
        if read < self.stale_reads {
            log::debug!("Serving stale answer {} to: {sql}", self.stale);
            return Ok(self.stale.clone());
        }
        self.inner.scalar_query(sql)
    }

    fn rows_query(&self, sql: &str, columns: &[String]) -> Result<Dataset> {
        self.inner.rows_query(sql, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sleeper_interrupts_after_budget() {
        let sleeper = RecordingSleeper::interrupting_after(2);
        assert!(sleeper.sleep(Duration::from_millis(5)).is_ok());
        assert!(sleeper.sleep(Duration::from_millis(5)).is_ok());
        assert!(sleeper.sleep(Duration::from_millis(5)).is_err());
        assert_eq!(sleeper.total(), Duration::from_millis(10));
    }

    #[test]
    fn test_scripted_store_repeats_last_scalar() {
        let store = ScriptedStore::new().with_scalars([Value::Int(1), Value::Int(2)]);
        let answers: Vec<Value> = (0..3).map(|_| store.scalar_query("q").unwrap()).collect();
        assert_eq!(answers, vec![Value::Int(1), Value::Int(2), Value::Int(2)]);
        assert_eq!(store.queries().len(), 3);
    }

    #[test]
    fn test_lagging_store_serves_stale_reads_first() {
        let inner = ScriptedStore::new().with_scalars([Value::Int(3)]);
        let store = LaggingStore::new(inner, 0, 2);
        let answers: Vec<Value> = (0..3).map(|_| store.scalar_query("q").unwrap()).collect();
        assert_eq!(answers, vec![Value::Int(0), Value::Int(0), Value::Int(3)]);
        assert_eq!(store.reads(), 3);
        assert_eq!(store.into_inner().queries().len(), 1);
    }
}
