//! dataspec test kit - fakes, fixtures and end-to-end harness.
//!
//! This crate provides utilities for testing dataspec through each of its
//! interfaces (library, CLI) and checking that they produce the same
//! consequences.
//!
//! # Key Types
//!
//! - [`TestWorkspace`]: Temporary directory with a SQLite database, settings file and templates
//! - [`ScriptedStore`], [`LaggingStore`], [`RecordingSleeper`]: Fakes for the persistence and sleep seams
//! - [`TableSnapshot`]: Captures table contents for comparison
//! - [`InterfaceRunner`]: Trait for running operations through different interfaces
//! - [`Scenario`]: Defines test setup, operations, and expected outcomes
//!
//! # Available Runners
//!
//! | Runner | Status | Description |
//! |--------|--------|-------------|
//! | `LibraryRunner` | ✅ Implemented | Baseline - calls dataspec directly |
//! | `CliRunner` | ✅ Implemented | Runs `dataspec` CLI binary (feature: `cli-runner`) |
//!
//! # Example
//!
//! ```no_run
//! use dataspec_testkit::{fixtures, TestWorkspace};
//!
//! let ws = TestWorkspace::new().unwrap();
//! ws.execute(fixtures::CUSTOMER_DDL).unwrap();
//!
//! let db = ws.open().unwrap();
//! let rows = fixtures::customer_rows()
//!     .build(&dataspec::DataTable::parse(fixtures::CUSTOMERS).unwrap().as_maps())
//!     .unwrap();
//! db.insert_all("customer", &rows).unwrap();
//! db.await_row_count("customer", 2).unwrap();
//! ```

pub mod fixtures;
mod fakes;
mod integration;
mod runner;
mod scenario;
mod snapshot;
mod workspace;

pub use fakes::{LaggingStore, RecordingSleeper, ScriptedStore};
pub use runner::{
    run_conformance_test, ConformanceResult, InterfaceRunner, LibraryRunner, Op, OpKind,
    RunResult,
};
pub use scenario::{standard, Expectation, Scenario, ScenarioReport, Step};
pub use snapshot::TableSnapshot;
pub use workspace::{TestWorkspace, TestWorkspaceError, DATABASE_FILE, TEMPLATES_DIR};

#[cfg(feature = "cli-runner")]
pub use runner::CliRunner;

/// Re-export dataspec for convenience in tests.
pub use dataspec;
