use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use fs_err as fs;
use serde_json::json;

use dataspec::{
    assert_equivalent, Database, DataTable, Overrides, Redactions, ResourceDir, RowConverter,
    RowsBuilder, Settings, SqliteSession, Value,
};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs SQL statements against the configured database
    Exec {
        #[clap(required = true)]
        sql: Vec<String>,
    },
    /// Inserts the rows of a data table file into a table
    Insert {
        table: String,
        file: PathBuf,
        /// Column to read as a date (YYYY-MM-DD)
        #[clap(long = "date")]
        dates: Vec<String>,
        /// Column to read as a timestamp (RFC 3339)
        #[clap(long = "timestamp")]
        timestamps: Vec<String>,
        /// Value for a column the table leaves empty, as COLUMN=VALUE
        #[clap(long = "default", value_parser = parse_pair)]
        defaults: Vec<(String, String)>,
    },
    /// Deletes every row of the given tables, in order
    Delete {
        #[clap(required = true)]
        tables: Vec<String>,
    },
    /// Prints the number of rows in a table
    Count { table: String },
    /// Waits until a table holds the given number of rows
    Await { table: String, count: u64 },
    /// Checks that a table holds exactly the rows of a data table file
    Verify {
        table: String,
        file: PathBuf,
        /// Compare only the first ten characters of this column
        #[clap(long = "date-prefix")]
        date_prefix: Vec<String>,
    },
    /// Compares a JSON document against a template
    Compare {
        /// Template name, relative to the configured template directory
        template: String,
        /// File holding the actual document
        actual: PathBuf,
        /// Value to write into the template first, as PATH=LITERAL
        #[clap(long = "override", value_parser = parse_pair)]
        overrides: Vec<(String, String)>,
        /// Path to redact on both sides
        #[clap(long = "redact")]
        redactions: Vec<String>,
    },
    /// Prints the next value of a sequence
    Sequence { name: String },
}

#[derive(Parser)]
#[clap(version, about)]
pub struct Cli {
    /// Settings file (default: dataspec.toml in this or a parent directory)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output results as JSON
    #[clap(long, global = true)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Command,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

fn load_settings(config: Option<&Path>, current_dir: &Path) -> Result<Settings> {
    match config {
        Some(path) => Ok(Settings::load(path)?),
        None => Settings::find(current_dir)
            .ok_or_else(|| {
                anyhow!(
                    "No {} found in {} or its parents",
                    dataspec::DEFAULT_SETTINGS_FILE,
                    current_dir.display()
                )
            })?
            .map_err(Into::into),
    }
}

fn strs(items: &[String]) -> Vec<&str> {
    items.iter().map(String::as_str).collect()
}

/// Open the configured database, run `f`, and close it again.
fn with_database<T>(
    cli: &Cli,
    current_dir: &Path,
    f: impl FnOnce(&Database<SqliteSession>) -> dataspec::Result<T>,
) -> Result<T> {
    let settings = load_settings(cli.config.as_deref(), current_dir)?;
    Ok(Database::scoped(&settings, f)?)
}

fn try_main(cli: &Cli) -> Result<()> {
    let current_dir = std::env::current_dir()?;

    match &cli.command {
        Command::Exec { sql } => {
            with_database(cli, &current_dir, |db| {
                sql.iter()
                    .try_for_each(|statement| db.session().execute_batch(statement))
            })?;
            if cli.json {
                println!("{}", json!({"status": "ok", "statements": sql.len()}));
            } else {
                println!("Executed {} statement(s)", sql.len());
            }
        }
        Command::Insert {
            table,
            file,
            dates,
            timestamps,
            defaults,
        } => {
            let inserted = with_database(cli, &current_dir, |db| {
                let data = DataTable::from_file(file)?;
                let rows = defaults
                    .iter()
                    .fold(RowsBuilder::new(), |b, (column, value)| {
                        b.with(column, Value::from(value.as_str()))
                    })
                    .as_date(&strs(dates))
                    .as_timestamp(&strs(timestamps))
                    .build(&data.as_maps())?;
                db.insert_all(table, &rows)
            })?;
            if cli.json {
                println!("{}", json!({"table": table, "inserted": inserted}));
            } else {
                println!("Inserted {inserted} row(s) into {table}");
            }
        }
        Command::Delete { tables } => {
            with_database(cli, &current_dir, |db| db.delete(&strs(tables)))?;
            if cli.json {
                println!("{}", json!({"status": "ok", "tables": tables}));
            } else {
                for table in tables {
                    println!("Deleted: {table}");
                }
            }
        }
        Command::Count { table } => {
            let count = with_database(cli, &current_dir, |db| db.select_count(table))?;
            if cli.json {
                println!("{}", json!({"table": table, "count": count}));
            } else {
                println!("{count}");
            }
        }
        Command::Await { table, count } => {
            with_database(cli, &current_dir, |db| db.await_row_count(table, *count))?;
            if cli.json {
                println!("{}", json!({"table": table, "count": count}));
            } else {
                println!("{table} has {count} row(s)");
            }
        }
        Command::Verify {
            table,
            file,
            date_prefix,
        } => {
            let rows = with_database(cli, &current_dir, |db| {
                let data = DataTable::from_file(file)?;
                let expected = RowsBuilder::new().build(&data.as_maps())?;
                let converter = RowConverter::new().date_prefix(&strs(date_prefix));
                db.verify_with(table, &expected, &converter)?;
                Ok(expected.len())
            })?;
            if cli.json {
                println!("{}", json!({"status": "ok", "table": table, "rows": rows}));
            } else {
                println!("{table} matches {} ({rows} row(s))", file.display());
            }
        }
        Command::Compare {
            template,
            actual,
            overrides,
            redactions,
        } => {
            // Documents need no database, only the template directory.
            let resources = match &cli.config {
                Some(path) => Settings::load(path)?.resources(),
                None => match Settings::find(&current_dir) {
                    Some(settings) => settings?.resources(),
                    None => ResourceDir::new(&current_dir),
                },
            };
            let template = resources.template(template)?;
            let actual = fs::read_to_string(actual)?;
            let overrides = Overrides::from_strings(overrides.iter().cloned())?;
            let redactions = Redactions::new(redactions)?;
            assert_equivalent(&template, &actual, Some(&overrides), Some(&redactions))?;
            if cli.json {
                println!("{}", json!({"status": "ok", "template": template.name()}));
            } else {
                println!("Document matches {}", template.name());
            }
        }
        Command::Sequence { name } => {
            let value = with_database(cli, &current_dir, |db| db.next_sequence_value(name))?;
            if cli.json {
                println!("{}", json!({"sequence": name, "value": value}));
            } else {
                println!("{value}");
            }
        }
    }
    Ok(())
}

fn report_json(e: &anyhow::Error) -> Result<()> {
    let report = match e.downcast_ref::<dataspec::Error>() {
        Some(err) => json!({
            "status": "error",
            "error_type": err.error_type(),
            "message": err.to_string(),
            "failure": err.failure(),
        }),
        None => json!({
            "status": "error",
            "error_type": "error",
            "message": format!("{e:#}"),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&report).context("Failed to render error")?);
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = try_main(&cli) {
        if cli.json {
            if let Err(render) = report_json(&e) {
                log::warn!("{render}");
            }
        }
        eprintln!("{e}");
        ::std::process::exit(1)
    }
}
