//! Interface runner trait and implementations.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
#[cfg(feature = "cli-runner")]
use std::path::PathBuf;

use dataspec::{
    assert_equivalent, Database, DataTable, Overrides, Redactions, RowConverter, RowsBuilder,
    SqliteSession, Value,
};

use crate::workspace::{TestWorkspace, TestWorkspaceError};

/// Operation to run through an interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Op {
    /// The kind of operation.
    pub kind: OpKind,
    /// Positional arguments for the operation.
    pub args: Vec<String>,
    /// Repeatable named options, `(name, value)`, passed as `--name value`.
    #[serde(default)]
    pub flags: Vec<(String, String)>,
}

/// Kind of dataspec operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Run SQL statements.
    Exec,
    /// Insert the rows of a data table file.
    Insert,
    /// Delete every row of tables.
    Delete,
    /// Count the rows of a table.
    Count,
    /// Wait for a row count.
    Await,
    /// Verify table contents against a data table file.
    Verify,
    /// Compare a document against a template.
    Compare,
    /// Read the next value of a sequence.
    Sequence,
}

impl OpKind {
    /// The CLI subcommand for this kind.
    pub fn command(self) -> &'static str {
        match self {
            OpKind::Exec => "exec",
            OpKind::Insert => "insert",
            OpKind::Delete => "delete",
            OpKind::Count => "count",
            OpKind::Await => "await",
            OpKind::Verify => "verify",
            OpKind::Compare => "compare",
            OpKind::Sequence => "sequence",
        }
    }
}

impl Op {
    fn new(kind: OpKind, args: &[&str]) -> Self {
        Self {
            kind,
            args: args.iter().map(|s| s.to_string()).collect(),
            flags: Vec::new(),
        }
    }

    /// Create an exec operation.
    pub fn exec(sql: &str) -> Self {
        Self::new(OpKind::Exec, &[sql])
    }

    /// Create an insert operation reading `file`.
    pub fn insert(table: &str, file: &str) -> Self {
        Self::new(OpKind::Insert, &[table, file])
    }

    /// Create a delete operation.
    pub fn delete(tables: &[&str]) -> Self {
        Self::new(OpKind::Delete, tables)
    }

    /// Create a count operation.
    pub fn count(table: &str) -> Self {
        Self::new(OpKind::Count, &[table])
    }

    /// Create an await operation.
    pub fn await_count(table: &str, count: u64) -> Self {
        Self::new(OpKind::Await, &[table, &count.to_string()])
    }

    /// Create a verify operation reading `file`.
    pub fn verify(table: &str, file: &str) -> Self {
        Self::new(OpKind::Verify, &[table, file])
    }

    /// Create a compare operation of the document in `actual_file`.
    pub fn compare(template: &str, actual_file: &str) -> Self {
        Self::new(OpKind::Compare, &[template, actual_file])
    }

    /// Create a sequence operation.
    pub fn sequence(name: &str) -> Self {
        Self::new(OpKind::Sequence, &[name])
    }

    /// Add a named option.
    pub fn with_flag(mut self, name: &str, value: &str) -> Self {
        self.flags.push((name.to_string(), value.to_string()));
        self
    }

    fn flag_values(&self, name: &str) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn arg(&self, index: usize, what: &str) -> dataspec::Result<&str> {
        self.args.get(index).map(String::as_str).ok_or_else(|| {
            dataspec::Error::invalid_input(format!("{} needs a {what}", self.kind.command()))
        })
    }
}

/// Result of running an operation through an interface.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Whether the operation succeeded.
    pub success: bool,

    /// Exit code (for CLI) or equivalent status.
    pub exit_code: i32,

    /// Standard output (for CLI) or result string.
    pub stdout: String,

    /// Standard error (for CLI) or error message.
    pub stderr: String,

    /// Stable error type string, as reported by `Error::error_type`.
    pub error_type: Option<String>,

    /// Structured result, the document the CLI prints with `--json`.
    pub output: Option<Json>,
}

impl RunResult {
    /// Create a successful result.
    pub fn success(output: Json) -> Self {
        Self {
            success: true,
            exit_code: 0,
            stdout: output.to_string(),
            stderr: String::new(),
            error_type: None,
            output: Some(output),
        }
    }

    /// Create a failed result.
    pub fn failure(exit_code: i32, stderr: String, error_type: Option<String>) -> Self {
        Self {
            success: false,
            exit_code,
            stdout: String::new(),
            stderr,
            error_type,
            output: None,
        }
    }

    /// Whether two results describe the same consequence: same success,
    /// same error type, and on success the same structured output.
    pub fn same_outcome(&self, other: &RunResult) -> bool {
        self.success == other.success
            && self.error_type == other.error_type
            && (!self.success || self.output == other.output)
    }
}

/// Trait for running operations through different interfaces.
///
/// Implementations:
/// - `LibraryRunner`: Calls the dataspec library directly (baseline)
/// - `CliRunner`: Runs the dataspec CLI binary
pub trait InterfaceRunner {
    /// Get the runner name.
    fn name(&self) -> &'static str;

    /// Run an operation and return the result.
    fn run(&self, workspace: &TestWorkspace, op: &Op) -> RunResult;

    /// Check if this runner is available.
    fn is_available(&self) -> bool {
        true
    }
}

/// Library runner - calls dataspec directly.
///
/// This is the baseline implementation that all other runners
/// should match.
#[derive(Debug, Default)]
pub struct LibraryRunner;

impl LibraryRunner {
    /// Create a new library runner.
    pub fn new() -> Self {
        Self
    }
}

impl InterfaceRunner for LibraryRunner {
    fn name(&self) -> &'static str {
        "library"
    }

    fn run(&self, workspace: &TestWorkspace, op: &Op) -> RunResult {
        let result = match op.kind {
            OpKind::Compare => run_compare(workspace, op),
            _ => Database::scoped(workspace.settings(), |db| run_with_db(workspace, db, op)),
        };
        match result {
            Ok(output) => RunResult::success(output),
            Err(e) => RunResult::failure(1, e.to_string(), Some(e.error_type().to_string())),
        }
    }
}

fn run_with_db(ws: &TestWorkspace, db: &Database<SqliteSession>, op: &Op) -> dataspec::Result<Json> {
    match op.kind {
        OpKind::Exec => {
            for sql in &op.args {
                db.session().execute_batch(sql)?;
            }
            Ok(json!({"status": "ok", "statements": op.args.len()}))
        }
        OpKind::Insert => {
            let table = op.arg(0, "table")?;
            let data = DataTable::from_file(ws.path(op.arg(1, "data file")?))?;
            let mut builder = RowsBuilder::new();
            for pair in op.flag_values("default") {
                let (column, value) = split_pair(pair)?;
                builder = builder.with(column, Value::from(value));
            }
            let rows = builder
                .as_date(&op.flag_values("date"))
                .as_timestamp(&op.flag_values("timestamp"))
                .build(&data.as_maps())?;
            let inserted = db.insert_all(table, &rows)?;
            Ok(json!({"table": table, "inserted": inserted}))
        }
        OpKind::Delete => {
            let tables: Vec<&str> = op.args.iter().map(String::as_str).collect();
            db.delete(&tables)?;
            Ok(json!({"status": "ok", "tables": tables}))
        }
        OpKind::Count => {
            let table = op.arg(0, "table")?;
            let count = db.select_count(table)?;
            Ok(json!({"table": table, "count": count}))
        }
        OpKind::Await => {
            let table = op.arg(0, "table")?;
            let count: u64 = op.arg(1, "count")?.parse().map_err(|_| {
                dataspec::Error::invalid_input(format!("{:?} is not a row count", op.args[1]))
            })?;
            db.await_row_count(table, count)?;
            Ok(json!({"table": table, "count": count}))
        }
        OpKind::Verify => {
            let table = op.arg(0, "table")?;
            let data = DataTable::from_file(ws.path(op.arg(1, "data file")?))?;
            let expected = RowsBuilder::new().build(&data.as_maps())?;
            let converter = RowConverter::new().date_prefix(&op.flag_values("date-prefix"));
            db.verify_with(table, &expected, &converter)?;
            Ok(json!({"status": "ok", "table": table, "rows": expected.len()}))
        }
        OpKind::Sequence => {
            let name = op.arg(0, "sequence name")?;
            let value = db.next_sequence_value(name)?;
            Ok(json!({"sequence": name, "value": value}))
        }
        OpKind::Compare => run_compare(ws, op),
    }
}

fn run_compare(ws: &TestWorkspace, op: &Op) -> dataspec::Result<Json> {
    let template = ws.settings().resources().template(op.arg(0, "template")?)?;
    let actual = fs_err::read_to_string(ws.path(op.arg(1, "document file")?))?;
    let overrides = Overrides::from_strings(
        op.flag_values("override")
            .into_iter()
            .map(split_pair)
            .collect::<dataspec::Result<Vec<_>>>()?,
    )?;
    let redactions = Redactions::new(op.flag_values("redact"))?;
    assert_equivalent(&template, &actual, Some(&overrides), Some(&redactions))?;
    Ok(json!({"status": "ok", "template": template.name()}))
}

fn split_pair(pair: &str) -> dataspec::Result<(&str, &str)> {
    pair.split_once('=')
        .ok_or_else(|| dataspec::Error::invalid_input(format!("expected KEY=VALUE, got {pair:?}")))
}

// ============================================================================
// CLI Runner (requires `cli-runner` feature)
// ============================================================================

/// CLI runner - runs the `dataspec` binary.
///
/// The binary runs in the workspace root with `--json`, so it picks up the
/// workspace settings file and reports structured output and error types.
#[cfg(feature = "cli-runner")]
pub struct CliRunner {
    /// Path to the dataspec binary.
    binary_path: PathBuf,
}

#[cfg(feature = "cli-runner")]
impl CliRunner {
    /// Create a new CLI runner using the default binary location.
    pub fn new() -> Self {
        let binary_path = Self::find_binary();
        Self { binary_path }
    }

    /// Create a CLI runner with a specific binary path.
    pub fn with_binary(path: PathBuf) -> Self {
        Self { binary_path: path }
    }

    /// Find the dataspec binary.
    fn find_binary() -> PathBuf {
        if let Ok(bin_path) = std::env::var("CARGO_BIN_EXE_dataspec") {
            return PathBuf::from(bin_path);
        }

        if let Ok(path) = assert_cmd::cargo::cargo_bin("dataspec").canonicalize() {
            return path;
        }

        // CARGO_MANIFEST_DIR points to dataspec-testkit, so go up one level
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            if let Some(root) = PathBuf::from(manifest_dir).parent() {
                for profile in ["debug", "release"] {
                    let path = root.join("target").join(profile).join("dataspec");
                    if path.exists() {
                        return path;
                    }
                }
            }
        }

        // Fallback: assume it's in PATH
        PathBuf::from("dataspec")
    }

    /// Get the command to run.
    fn command(&self) -> std::process::Command {
        std::process::Command::new(&self.binary_path)
    }
}

#[cfg(feature = "cli-runner")]
impl Default for CliRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli-runner")]
impl InterfaceRunner for CliRunner {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn run(&self, workspace: &TestWorkspace, op: &Op) -> RunResult {
        let mut cmd = self.command();
        cmd.current_dir(workspace.root())
            .arg("--json")
            .arg(op.kind.command())
            .args(&op.args);
        for (name, value) in &op.flags {
            cmd.arg(format!("--{name}")).arg(value);
        }

        let output = match cmd.output() {
            Ok(o) => o,
            Err(e) => {
                return RunResult::failure(-1, format!("Failed to execute command: {}", e), None);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);
        let success = output.status.success();
        let parsed: Option<Json> = serde_json::from_str(stdout.trim()).ok();

        let error_type = if success {
            None
        } else {
            parsed
                .as_ref()
                .and_then(|report| report.get("error_type"))
                .and_then(Json::as_str)
                .map(String::from)
        };

        RunResult {
            success,
            exit_code,
            stdout,
            stderr,
            error_type,
            output: if success { parsed } else { None },
        }
    }

    fn is_available(&self) -> bool {
        self.binary_path.exists()
    }
}

// ============================================================================
// Conformance testing utilities
// ============================================================================

/// Run the same operations through two runners, each against its own
/// freshly set up workspace, and compare the outcome of every step.
pub fn run_conformance_test<R1: InterfaceRunner, R2: InterfaceRunner>(
    baseline: &R1,
    runner: &R2,
    setup_workspace: impl Fn() -> Result<TestWorkspace, TestWorkspaceError>,
    ops: &[Op],
) -> ConformanceResult {
    let ws1 = match setup_workspace() {
        Ok(ws) => ws,
        Err(e) => return ConformanceResult::SetupError(format!("Baseline workspace: {}", e)),
    };
    let ws2 = match setup_workspace() {
        Ok(ws) => ws,
        Err(e) => return ConformanceResult::SetupError(format!("Runner workspace: {}", e)),
    };

    for (step, op) in ops.iter().enumerate() {
        let expected = baseline.run(&ws1, op);
        let actual = runner.run(&ws2, op);
        if !expected.same_outcome(&actual) {
            return ConformanceResult::Mismatch {
                baseline_name: baseline.name().to_string(),
                runner_name: runner.name().to_string(),
                step,
                baseline: Box::new(expected),
                runner: Box::new(actual),
            };
        }
    }
    ConformanceResult::Pass
}

/// Result of a conformance test.
#[derive(Debug)]
pub enum ConformanceResult {
    /// Test passed - results match.
    Pass,
    /// Setup error.
    SetupError(String),
    /// Results don't match.
    Mismatch {
        baseline_name: String,
        runner_name: String,
        step: usize,
        baseline: Box<RunResult>,
        runner: Box<RunResult>,
    },
}

impl ConformanceResult {
    /// Check if the test passed.
    pub fn passed(&self) -> bool {
        matches!(self, ConformanceResult::Pass)
    }
}
