//! Declarative verification of database tables and JSON documents.
//!
//! Expected data is written as tables of strings (see [`DataTable`]) or as
//! JSON templates. The library turns tables into typed rows
//! ([`RowsBuilder`]), inserts and reads them through a [`Persistence`]
//! session ([`Database`]), matches expected rows against what is actually
//! stored ([`matching`]), waits for eventually consistent row counts
//! ([`poll`]), and compares JSON documents after overrides and redactions
//! ([`document`]).

pub mod builder;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod failure;
pub mod matching;
pub mod path;
pub mod persistence;
pub mod poll;
pub mod resources;
pub mod row;
pub mod table;
pub mod value;

pub use builder::{RowBuilder, RowsBuilder};
pub use config::{DatabaseSettings, Dialect, Settings, DEFAULT_SETTINGS_FILE};
pub use db::Database;
pub use document::{assert_equivalent, Document, Overrides, Redactions, Template, REDACTED};
pub use error::{Error, Result};
pub use failure::{ColumnDiff, Failure};
pub use matching::{verify, verify_with, RowConverter};
pub use path::DocPath;
pub use persistence::sqlite::SqliteSession;
pub use persistence::Persistence;
pub use poll::{Interrupter, PollOutcome, PollPolicy, Sleeper, ThreadSleeper};
pub use resources::ResourceDir;
pub use row::{CanonicalRow, Dataset, RawRow, Row};
pub use table::DataTable;
pub use value::{Param, TemporalKind, Value};
