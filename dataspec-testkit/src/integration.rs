//! End-to-end tests against real SQLite databases in temp directories.
//!
//! These tests exercise complete workflows: building rows from data tables,
//! inserting them, verifying table contents, waiting for row counts, and
//! comparing documents loaded from a template directory.

#[cfg(test)]
mod tests {
    use crate::fakes::{LaggingStore, RecordingSleeper};
    use crate::fixtures;
    use crate::snapshot::TableSnapshot;
    use crate::workspace::TestWorkspace;
    use dataspec::{
        assert_equivalent, Database, DataTable, Dialect, Failure, Overrides, Redactions, Row,
        RowConverter, RowsBuilder, Settings, SqliteSession, ThreadSleeper, Value,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn customer_workspace() -> TestWorkspace {
        let ws = TestWorkspace::new().unwrap();
        ws.execute(fixtures::CUSTOMER_DDL).unwrap();
        ws
    }

    fn rows(table: &str) -> Vec<Row> {
        RowsBuilder::new()
            .build(&DataTable::parse(table).unwrap().as_maps())
            .unwrap()
    }

    fn insert_customers(db: &Database<SqliteSession>) {
        let data = DataTable::parse(fixtures::CUSTOMERS).unwrap();
        let customers = fixtures::customer_rows().build(&data.as_maps()).unwrap();
        assert_eq!(db.insert_all("customer", &customers).unwrap(), 2);
    }

    // ============================================================================
    // Insert then verify
    // ============================================================================

    #[test]
    fn test_inserted_customers_verify_in_any_order() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        insert_customers(&db);

        db.verify("customer", &rows(fixtures::CUSTOMERS_STORED)).unwrap();
        assert_eq!(db.select_count("customer").unwrap(), 2);
    }

    #[test]
    fn test_defaults_fill_empty_cells_but_not_given_ones() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        insert_customers(&db);

        let names = db
            .select("customer", &["id".to_string(), "name".to_string()], &RowConverter::new())
            .unwrap();
        let mut names: Vec<String> = names.iter().map(|r| r.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "{id=1, name=Default customer name}".to_string(),
                "{id=2, name=Bob}".to_string(),
            ]
        );
    }

    #[test]
    fn test_snapshots_track_inserts_and_deletes() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        let capture = |db: &Database<SqliteSession>| {
            TableSnapshot::capture(db, "customer", &["id", "name"]).unwrap()
        };
        assert!(capture(&db).is_empty());

        insert_customers(&db);
        let inserted = capture(&db);
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted.rows[0].to_string(), "{id=1, name=Default customer name}");
        assert_eq!(inserted.rows[1].to_string(), "{id=2, name=Bob}");

        db.delete(&["customer"]).unwrap();
        let (removed, added) = inserted.diff(&capture(&db));
        assert_eq!(removed, inserted.rows);
        assert!(added.is_empty());
    }

    #[test]
    fn test_empty_cells_take_column_defaults() {
        let ws = TestWorkspace::new().unwrap();
        ws.execute("create table tag (id bigint, label text default 'none')")
            .unwrap();
        let db = ws.open().unwrap();
        db.insert_all("tag", &rows("| id | label |\n| 1 | |\n| 2 | hot |"))
            .unwrap();
        db.verify("tag", &rows("| id | label |\n| 1 | none |\n| 2 | hot |"))
            .unwrap();
    }

    #[test]
    fn test_duplicate_rows_are_matched_as_a_multiset() {
        let ws = TestWorkspace::new().unwrap();
        ws.execute(
            "create table visit (page text, hits bigint);
             insert into visit values ('home', 1), ('home', 1), ('about', 2);",
        )
        .unwrap();
        let db = ws.open().unwrap();

        db.verify(
            "visit",
            &rows("| page | hits |\n| about | 2 |\n| home | 1 |\n| home | 1 |"),
        )
        .unwrap();

        let err = db
            .verify("visit", &rows("| page | hits |\n| about | 2 |\n| home | 1 |"))
            .unwrap_err();
        assert_eq!(err.error_type(), "unexpected_rows");
    }

    #[test]
    fn test_decimal_text_matches_stored_number() {
        let ws = TestWorkspace::new().unwrap();
        ws.execute(
            "create table account (id bigint, amount real);
             insert into account values (1, 1.0);",
        )
        .unwrap();
        let db = ws.open().unwrap();
        db.verify("account", &rows("| id | amount |\n| 1 | 1.00 |"))
            .unwrap();
    }

    // ============================================================================
    // Verify diagnostics
    // ============================================================================

    #[test]
    fn test_empty_expectation_checks_row_count() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        db.verify("customer", &[]).unwrap();

        insert_customers(&db);
        let err = db.verify("customer", &[]).unwrap_err();
        assert_eq!(
            err.failure(),
            Some(&Failure::RowCount {
                table: Some("customer".to_string()),
                expected: 0,
                actual: 2,
            })
        );
        assert_eq!(err.to_string(), "Row count in table customer expected 0, but was 2.");
    }

    #[test]
    fn test_missing_row_dumps_actual_data() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        let err = db
            .verify("customer", &rows(fixtures::CUSTOMERS_ONLY_BOB))
            .unwrap_err();
        assert_eq!(err.error_type(), "missing_row");
        let message = err.to_string();
        assert!(message.starts_with("Missing row:\n"), "{message}");
        assert!(message.contains("name=Bob"), "{message}");
        assert!(message.contains("(no rows)"), "{message}");
    }

    #[test]
    fn test_no_match_reports_best_match_and_differences() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        insert_customers(&db);

        let err = db
            .verify("customer", &rows(fixtures::CUSTOMERS_WRONG_NAME))
            .unwrap_err();
        let Some(Failure::NoMatch {
            expected,
            best_match,
            differences,
            actual_data,
        }) = err.failure()
        else {
            panic!("expected a no-match failure, got {err:?}");
        };
        assert_eq!(expected.get("name"), Some("Robert"));
        assert_eq!(best_match.get("id"), Some("2"));
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].to_string(), "name expected: Robert, but was: Bob");
        assert_eq!(actual_data.len(), 2);
    }

    #[test]
    fn test_unexpected_row_is_listed() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        insert_customers(&db);

        let err = db
            .verify("customer", &rows(fixtures::CUSTOMERS_ONLY_BOB))
            .unwrap_err();
        let Some(Failure::UnexpectedRows { rows, .. }) = err.failure() else {
            panic!("expected unexpected rows, got {err:?}");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(fixtures::DEFAULT_CUSTOMER_NAME));
        assert!(err.to_string().starts_with("Unexpected row(s):\n"));
    }

    #[test]
    fn test_empty_expected_cell_matches_null_only() {
        let ws = TestWorkspace::new().unwrap();
        ws.execute(
            "create table note (id bigint, body text);
             insert into note values (1, null);",
        )
        .unwrap();
        let db = ws.open().unwrap();

        db.verify("note", &rows("| id | body |\n| 1 | |")).unwrap();
        let err = db.verify("note", &rows("| id | body |\n| 1 | x |")).unwrap_err();
        assert_eq!(err.error_type(), "no_match");

        ws.execute("update note set body = ''").unwrap();
        let err = db.verify("note", &rows("| id | body |\n| 1 | |")).unwrap_err();
        assert_eq!(err.error_type(), "no_match");
    }

    #[test]
    fn test_date_prefix_converter_trims_timestamps() {
        let ws = TestWorkspace::new().unwrap();
        ws.execute(
            "create table event (id bigint, happened_on text);
             insert into event values (1, '2017-01-02 00:00:00');",
        )
        .unwrap();
        let db = ws.open().unwrap();
        let expected = rows("| id | happened_on |\n| 1 | 2017-01-02 |");

        assert_eq!(db.verify("event", &expected).unwrap_err().error_type(), "no_match");
        db.verify_with(
            "event",
            &expected,
            &RowConverter::new().date_prefix(&["happened_on"]),
        )
        .unwrap();
    }

    // ============================================================================
    // Eventual consistency
    // ============================================================================

    fn lagging_db(
        ws: &TestWorkspace,
        stale: i64,
        stale_reads: usize,
        sleeper: RecordingSleeper,
    ) -> Database<LaggingStore<SqliteSession>> {
        let session = SqliteSession::open(&ws.settings().database).unwrap();
        Database::new(LaggingStore::new(session, stale, stale_reads), "main", Dialect::Sqlite)
            .with_sleeper(sleeper)
    }

    fn insert_five(ws: &TestWorkspace) {
        ws.execute(
            "create table job (id bigint);
             insert into job values (1), (2), (3), (4), (5);",
        )
        .unwrap();
    }

    #[test]
    fn test_await_converges_on_third_attempt() {
        let ws = TestWorkspace::new().unwrap();
        insert_five(&ws);
        let sleeper = RecordingSleeper::new();
        let db = lagging_db(&ws, 0, 2, sleeper.clone());

        db.await_row_count("job", 5).unwrap();
        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(200); 2]);
        assert_eq!(db.session().reads(), 3);
    }

    #[test]
    fn test_await_gives_up_with_last_observed_count() {
        let ws = TestWorkspace::new().unwrap();
        insert_five(&ws);
        let sleeper = RecordingSleeper::new();
        let db = lagging_db(&ws, 3, usize::MAX, sleeper.clone());

        let err = db.await_row_count("job", 5).unwrap_err();
        assert!(err.is_failure());
        assert_eq!(
            err.failure(),
            Some(&Failure::RowCountNotConverged {
                table: "job".to_string(),
                expected: 5,
                actual: 3,
                attempts: 50,
            })
        );
        assert_eq!(sleeper.sleeps().len(), 49);
        assert_eq!(db.session().reads(), 50);
    }

    #[test]
    fn test_await_interruption_is_not_a_failure() {
        let ws = TestWorkspace::new().unwrap();
        insert_five(&ws);
        let db = lagging_db(&ws, 0, usize::MAX, RecordingSleeper::interrupting_after(1));

        let err = db.await_row_count("job", 5).unwrap_err();
        assert!(!err.is_failure());
        assert_eq!(err.error_type(), "interrupted");
        assert_eq!(err.to_string(), "Interrupted while awaiting row count of table job");
    }

    #[test]
    fn test_thread_sleeper_is_interrupted_from_another_thread() {
        let ws = TestWorkspace::new().unwrap();
        insert_five(&ws);
        let sleeper = ThreadSleeper::new();
        let interrupter = sleeper.interrupter();
        let session = SqliteSession::open(&ws.settings().database).unwrap();
        let db = Database::new(LaggingStore::new(session, 0, usize::MAX), "main", Dialect::Sqlite)
            .with_sleeper(sleeper);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            interrupter.interrupt();
        });
        let err = db.await_row_count("job", 5).unwrap_err();
        handle.join().unwrap();
        assert_eq!(err.error_type(), "interrupted");
    }

    #[test]
    fn test_await_uses_workspace_poll_settings() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        let err = db.await_row_count("customer", 1).unwrap_err();
        let Some(Failure::RowCountNotConverged { attempts, actual, .. }) = err.failure() else {
            panic!("expected a convergence failure, got {err:?}");
        };
        assert_eq!(*attempts, 5);
        assert_eq!(*actual, 0);
    }

    // ============================================================================
    // Documents
    // ============================================================================

    #[test]
    fn test_override_fills_placeholder() {
        let ws = TestWorkspace::new().unwrap();
        ws.write_template("id.json", r#"{"id": "${id}"}"#).unwrap();
        let template = ws.settings().resources().template("id.json").unwrap();

        let overrides = Overrides::new().with("id", 42).unwrap();
        assert_equivalent(&template, r#"{"id": 42}"#, Some(&overrides), None).unwrap();

        let err = assert_equivalent(&template, r#"{"id": 42}"#, None, None).unwrap_err();
        assert_eq!(
            err.failure(),
            Some(&Failure::DocumentMismatch {
                template: "id.json".to_string(),
                expected: "{\n  \"id\": \"${id}\"\n}".to_string(),
                actual: "{\n  \"id\": 42\n}".to_string(),
            })
        );
    }

    #[test]
    fn test_redaction_hides_volatile_fields() {
        let ws = TestWorkspace::new().unwrap();
        ws.write_template("order.json", fixtures::ORDER_TEMPLATE).unwrap();
        let template = ws.settings().resources().template("order.json").unwrap();
        let overrides = Overrides::new().with("id", 42).unwrap();
        let redactions = Redactions::new(["placedAt"]).unwrap();

        assert_equivalent(
            &template,
            fixtures::ORDER_RESPONSE,
            Some(&overrides),
            Some(&redactions),
        )
        .unwrap();

        let err = assert_equivalent(&template, fixtures::ORDER_RESPONSE, Some(&overrides), None)
            .unwrap_err();
        assert_eq!(err.error_type(), "document_mismatch");
        assert!(err.to_string().contains("2024-05-01T09:30:00Z"));
    }

    #[test]
    fn test_missing_template_names_the_file() {
        let ws = TestWorkspace::new().unwrap();
        let err = ws.settings().resources().template("nope.json").unwrap_err();
        assert_eq!(err.error_type(), "resource_error");
        assert_eq!(err.to_string(), "Cannot read file nope.json. Does it exist?");
    }

    // ============================================================================
    // Settings and sessions
    // ============================================================================

    #[test]
    fn test_settings_found_from_nested_directory() {
        let ws = TestWorkspace::new().unwrap();
        ws.write_file("features/orders/.keep", b"").unwrap();
        let found = Settings::find(ws.path("features/orders")).unwrap().unwrap();
        assert_eq!(&found, ws.settings());
    }

    #[test]
    fn test_missing_setting_is_named() {
        let ws = TestWorkspace::new().unwrap();
        ws.write_file(
            "partial.toml",
            b"[database]\ndriver = \"sqlite\"\nurl = \"x.db\"\nuser = \"sa\"\npassword = \"\"\ndialect = \"sqlite\"\n",
        )
        .unwrap();
        let err = Settings::load(ws.path("partial.toml")).unwrap_err();
        assert_eq!(err.error_type(), "config_error");
        assert!(err.to_string().contains("Database schema is required."));
    }

    #[test]
    fn test_scoped_releases_session_after_failure() {
        let ws = customer_workspace();
        let err = Database::scoped(ws.settings(), |db| {
            // In exclusive locking mode the first write holds the file lock
            // until the connection closes.
            db.session().execute_batch(
                "PRAGMA locking_mode = EXCLUSIVE;
                 insert into customer (id, name, time_created) values (9, 'x', '2017-01-01');
                 delete from customer where id = 9;",
            )?;
            db.verify("customer", &rows("| id |\n| 1 |"))
        })
        .unwrap_err();
        assert_eq!(err.error_type(), "missing_row");

        let db = ws.open().unwrap();
        insert_customers(&db);
        assert_eq!(db.select_count("customer").unwrap(), 2);
    }

    #[test]
    fn test_sequences_are_unsupported_on_sqlite() {
        let ws = TestWorkspace::new().unwrap();
        let err = ws.open().unwrap().next_sequence_value("customer_seq").unwrap_err();
        assert_eq!(err.error_type(), "unsupported");
    }

    // ============================================================================
    // Bad input
    // ============================================================================

    #[test]
    fn test_null_parameter_is_rejected() {
        let ws = customer_workspace();
        let db = ws.open().unwrap();
        let row: Row = [
            ("id", Value::Int(1)),
            ("name", Value::from("Alice")),
            ("time_created", Value::from("2017-01-01 00:00:00.000")),
            ("comment", Value::Null),
        ]
        .into_iter()
        .collect();

        let err = db.insert("customer", &row).unwrap_err();
        assert_eq!(err.error_type(), "unsupported_parameter");
        assert!(err.to_string().contains("comment"));
        assert_eq!(db.select_count("customer").unwrap(), 0);
    }

    #[test]
    fn test_malformed_date_names_the_column() {
        let data = DataTable::parse(fixtures::CUSTOMER_MALFORMED_DATE).unwrap();
        let err = fixtures::customer_rows().build(&data.as_maps()).unwrap_err();
        assert_eq!(err.error_type(), "malformed_value");
        let message = err.to_string();
        assert!(message.contains("date_acquired"), "{message}");
        assert!(message.contains("2017-13-45"), "{message}");
    }

    #[test]
    fn test_single_row_accessor_requires_one_row() {
        let err = DataTable::parse(fixtures::CUSTOMERS).unwrap().as_row().unwrap_err();
        assert!(err.to_string().ends_with("Must provide exactly 1 data row, got 2."));
    }
}
