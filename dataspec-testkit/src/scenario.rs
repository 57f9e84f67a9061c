//! Test scenario definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::runner::{InterfaceRunner, Op};
use crate::workspace::{TestWorkspace, TestWorkspaceError};

/// A test scenario: setup, operations, and expected outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,

    /// Description of what this scenario tests.
    pub description: String,

    /// Setup: files, templates and SQL to prepare before running steps.
    pub setup: Setup,

    /// Steps: operations to run in order.
    pub steps: Vec<Step>,

    /// Expected outcomes after all steps.
    pub expect: Expectation,
}

/// Setup phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Setup {
    /// Files to create: path -> contents.
    pub files: BTreeMap<String, String>,

    /// Templates to create under the template directory: name -> text.
    pub templates: BTreeMap<String, String>,

    /// SQL scripts to run, in order, after the files are written.
    pub sql: Vec<String>,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step name/description.
    pub name: String,

    /// Operation to run.
    pub op: Op,

    /// Whether this step should fail.
    #[serde(default)]
    pub expect_failure: bool,

    /// Expected error type (if expect_failure is true).
    pub expect_error_type: Option<String>,
}

impl Step {
    /// Create a new step.
    pub fn new(name: &str, op: Op) -> Self {
        Self {
            name: name.to_string(),
            op,
            expect_failure: false,
            expect_error_type: None,
        }
    }

    /// Create a step that expects failure.
    pub fn expect_failure(name: &str, op: Op, error_type: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            op,
            expect_failure: true,
            expect_error_type: error_type.map(String::from),
        }
    }
}

/// Expected outcomes after running a scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expectation {
    /// Expected row count per table.
    pub row_counts: BTreeMap<String, u64>,
}

impl Scenario {
    /// Create a new scenario builder.
    pub fn builder(name: &str) -> ScenarioBuilder {
        ScenarioBuilder::new(name)
    }

    /// Write the setup files and run the setup SQL in `workspace`.
    pub fn prepare(&self, workspace: &TestWorkspace) -> Result<(), TestWorkspaceError> {
        for (path, contents) in &self.setup.files {
            workspace.write_file(path, contents.as_bytes())?;
        }
        for (name, text) in &self.setup.templates {
            workspace.write_template(name, text)?;
        }
        for sql in &self.setup.sql {
            workspace.execute(sql)?;
        }
        Ok(())
    }

    /// Run the scenario through `runner` in a fresh workspace and check
    /// every step and expectation.
    pub fn run(&self, runner: &dyn InterfaceRunner) -> Result<ScenarioReport, TestWorkspaceError> {
        let workspace = TestWorkspace::new()?;
        self.prepare(&workspace)?;

        let mut report = ScenarioReport {
            scenario: self.name.clone(),
            runner: runner.name().to_string(),
            problems: Vec::new(),
        };

        for step in &self.steps {
            let result = runner.run(&workspace, &step.op);
            log::debug!("{} / {}: {:?}", self.name, step.name, result);
            if result.success == step.expect_failure {
                let verb = if step.expect_failure { "succeeded" } else { "failed" };
                report.problems.push(format!(
                    "step '{}' unexpectedly {verb}: {}",
                    step.name,
                    if result.success { &result.stdout } else { &result.stderr }
                ));
                continue;
            }
            if let Some(expected) = &step.expect_error_type {
                if result.error_type.as_ref() != Some(expected) {
                    report.problems.push(format!(
                        "step '{}' failed with {:?}, expected {expected}",
                        step.name, result.error_type
                    ));
                }
            }
        }

        if !self.expect.row_counts.is_empty() {
            let db = workspace.open()?;
            for (table, expected) in &self.expect.row_counts {
                let actual = db.select_count(table)?;
                if actual != *expected {
                    report
                        .problems
                        .push(format!("table {table} has {actual} rows, expected {expected}"));
                }
            }
            db.close()?;
        }

        Ok(report)
    }
}

/// What went wrong when running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: String,
    pub runner: String,
    pub problems: Vec<String>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Builder for creating scenarios.
pub struct ScenarioBuilder {
    name: String,
    description: String,
    setup: Setup,
    steps: Vec<Step>,
    expect: Expectation,
}

impl ScenarioBuilder {
    /// Create a new builder.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            setup: Setup::default(),
            steps: Vec::new(),
            expect: Expectation::default(),
        }
    }

    /// Set the description.
    pub fn description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    /// Add a setup file.
    pub fn setup_file(mut self, path: &str, content: &str) -> Self {
        self.setup.files.insert(path.to_string(), content.to_string());
        self
    }

    /// Add a setup template.
    pub fn setup_template(mut self, name: &str, text: &str) -> Self {
        self.setup.templates.insert(name.to_string(), text.to_string());
        self
    }

    /// Add a setup SQL script.
    pub fn setup_sql(mut self, sql: &str) -> Self {
        self.setup.sql.push(sql.to_string());
        self
    }

    /// Add a step.
    pub fn step(mut self, name: &str, op: Op) -> Self {
        self.steps.push(Step::new(name, op));
        self
    }

    /// Add a step that expects failure.
    pub fn step_expect_failure(mut self, name: &str, op: Op, error_type: Option<&str>) -> Self {
        self.steps.push(Step::expect_failure(name, op, error_type));
        self
    }

    /// Expect a row count for a table after all steps.
    pub fn expect_row_count(mut self, table: &str, count: u64) -> Self {
        self.expect.row_counts.insert(table.to_string(), count);
        self
    }

    /// Build the scenario.
    pub fn build(self) -> Scenario {
        Scenario {
            name: self.name,
            description: self.description,
            setup: self.setup,
            steps: self.steps,
            expect: self.expect,
        }
    }
}

/// Standard scenarios over the customer fixture.
pub mod standard {
    use super::*;
    use crate::fixtures;

    fn insert_customers() -> Op {
        Op::insert("customer", "customers.txt")
            .with_flag("default", &format!("name={}", fixtures::DEFAULT_CUSTOMER_NAME))
            .with_flag("default", &format!("time_created={}", fixtures::DEFAULT_TIME_CREATED))
            .with_flag("date", "date_acquired")
            .with_flag("timestamp", "time_created")
    }

    fn customers() -> ScenarioBuilder {
        ScenarioBuilder::new("")
            .setup_sql(fixtures::CUSTOMER_DDL)
            .setup_file("customers.txt", fixtures::CUSTOMERS)
            .setup_file("stored.txt", fixtures::CUSTOMERS_STORED)
            .setup_file("wrong.txt", fixtures::CUSTOMERS_WRONG_NAME)
            .setup_file("only_bob.txt", fixtures::CUSTOMERS_ONLY_BOB)
            .setup_file("malformed.txt", fixtures::CUSTOMER_MALFORMED_DATE)
    }

    fn named(builder: ScenarioBuilder, name: &str, description: &str) -> ScenarioBuilder {
        ScenarioBuilder {
            name: name.to_string(),
            ..builder
        }
        .description(description)
    }

    /// Insert customers and verify them, listed in another order.
    pub fn insert_and_verify() -> Scenario {
        named(customers(), "insert_and_verify", "Inserted rows verify in any order")
            .step("insert", insert_customers())
            .step("verify", Op::verify("customer", "stored.txt"))
            .expect_row_count("customer", 2)
            .build()
    }

    /// A wrong cell value is a no-match failure.
    pub fn verify_wrong_value() -> Scenario {
        named(customers(), "verify_wrong_value", "A differing cell fails with a best match")
            .step("insert", insert_customers())
            .step_expect_failure(
                "verify",
                Op::verify("customer", "wrong.txt"),
                Some("no_match"),
            )
            .build()
    }

    /// An actual row nobody expected.
    pub fn verify_unexpected_row() -> Scenario {
        named(customers(), "verify_unexpected_row", "A leftover actual row fails")
            .step("insert", insert_customers())
            .step_expect_failure(
                "verify",
                Op::verify("customer", "only_bob.txt"),
                Some("unexpected_rows"),
            )
            .build()
    }

    /// Deleting empties the table, and an empty table verifies against
    /// nothing but fails against rows.
    pub fn delete_then_verify() -> Scenario {
        named(customers(), "delete_then_verify", "Verify after delete")
            .setup_file("none.txt", "| id |\n")
            .step("insert", insert_customers())
            .step_expect_failure(
                "verify empty",
                Op::verify("customer", "none.txt"),
                Some("row_count"),
            )
            .step("delete", Op::delete(&["customer"]))
            .step("verify empty", Op::verify("customer", "none.txt"))
            .step_expect_failure(
                "verify rows",
                Op::verify("customer", "stored.txt"),
                Some("missing_row"),
            )
            .expect_row_count("customer", 0)
            .build()
    }

    /// Waiting for a count that never comes.
    pub fn await_times_out() -> Scenario {
        named(customers(), "await_times_out", "Await fails with the last count seen")
            .step("insert", insert_customers())
            .step("await reached", Op::await_count("customer", 2))
            .step_expect_failure(
                "await unreachable",
                Op::await_count("customer", 3),
                Some("row_count_not_converged"),
            )
            .build()
    }

    /// A malformed date cell is rejected before anything is inserted.
    pub fn insert_malformed_date() -> Scenario {
        named(customers(), "insert_malformed_date", "Bad dates name their column")
            .step_expect_failure(
                "insert",
                Op::insert("customer", "malformed.txt").with_flag("date", "date_acquired"),
                Some("malformed_value"),
            )
            .expect_row_count("customer", 0)
            .build()
    }

    /// Document comparison with an override and a redaction.
    pub fn compare_document() -> Scenario {
        Scenario::builder("compare_document")
            .description("Templates match once placeholders and volatile fields are handled")
            .setup_template("order.json", fixtures::ORDER_TEMPLATE)
            .setup_file("response.json", fixtures::ORDER_RESPONSE)
            .step(
                "compare",
                Op::compare("order.json", "response.json")
                    .with_flag("override", "id=42")
                    .with_flag("redact", "placedAt"),
            )
            .step_expect_failure(
                "compare without override",
                Op::compare("order.json", "response.json").with_flag("redact", "placedAt"),
                Some("document_mismatch"),
            )
            .step_expect_failure(
                "compare missing template",
                Op::compare("missing.json", "response.json"),
                Some("resource_error"),
            )
            .build()
    }

    /// All standard scenarios.
    pub fn all() -> Vec<Scenario> {
        vec![
            insert_and_verify(),
            verify_wrong_value(),
            verify_unexpected_row(),
            delete_then_verify(),
            await_times_out(),
            insert_malformed_date(),
            compare_document(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::LibraryRunner;

    #[test]
    fn test_scenario_builder() {
        let scenario = Scenario::builder("test")
            .description("A test scenario")
            .setup_file("data.txt", "| id |\n| 1 |\n")
            .setup_sql("create table t (id integer)")
            .step("count", Op::count("t"))
            .expect_row_count("t", 0)
            .build();

        assert_eq!(scenario.name, "test");
        assert_eq!(scenario.setup.files.len(), 1);
        assert_eq!(scenario.setup.sql.len(), 1);
        assert_eq!(scenario.steps.len(), 1);
        assert_eq!(scenario.expect.row_counts.get("t"), Some(&0));
    }

    #[test]
    fn test_standard_scenarios() {
        let scenarios = standard::all();
        assert!(!scenarios.is_empty());

        for s in scenarios {
            assert!(!s.name.is_empty());
            assert!(!s.description.is_empty());
        }
    }

    #[test]
    fn test_standard_scenarios_pass_through_library() {
        let runner = LibraryRunner::new();
        for scenario in standard::all() {
            let report = scenario.run(&runner).unwrap();
            assert!(report.passed(), "{}: {:?}", report.scenario, report.problems);
        }
    }

    #[test]
    fn test_report_lists_unexpected_success() {
        let scenario = Scenario::builder("wrong_expectation")
            .description("Expects a failure that does not happen")
            .setup_sql("create table t (id integer)")
            .step_expect_failure("count", Op::count("t"), Some("no_match"))
            .expect_row_count("t", 1)
            .build();
        let report = scenario.run(&LibraryRunner::new()).unwrap();
        assert_eq!(report.problems.len(), 2);
        assert!(report.problems[0].contains("unexpectedly succeeded"));
        assert!(report.problems[1].contains("has 0 rows, expected 1"));
    }
}
