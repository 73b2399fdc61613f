use duckdb_driver::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.duckdb"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

#[test]
fn cursor_operations_on_a_closed_driver_fail_cleanly() -> Result<(), Box<dyn std::error::Error>> {
    let driver = DuckdbDriver::new();
    driver.open(":memory:", "")?;
    let mut cursor = driver.create_cursor();
    driver.close();
    assert!(!driver.is_open());

    let err = cursor.prepare("SELECT 1").expect_err("closed driver");
    assert_eq!(err.category(), ErrorCategory::Connection);
    let err = cursor.execute().expect_err("closed driver");
    assert_eq!(err.category(), ErrorCategory::Connection);
    Ok(())
}

#[test]
fn close_finalizes_live_cursors() -> Result<(), Box<dyn std::error::Error>> {
    let driver = DuckdbDriver::new();
    driver.open(":memory:", "")?;
    let mut cursor = driver.create_cursor();
    cursor.prepare("SELECT CAST(1 AS INTEGER)")?;
    cursor.execute()?;
    assert!(cursor.is_active());

    driver.close();
    assert!(!cursor.is_active());
    // Fetching after close is a connection-level failure, not a statement one.
    let err = cursor.fetch_row(0).expect_err("closed driver");
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(err.to_string().contains("No query"));
    // Closing again is a no-op.
    driver.close();
    Ok(())
}

#[test]
fn finalize_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let driver = DuckdbDriver::new();
    driver.open(":memory:", "")?;
    let mut cursor = driver.create_cursor();
    cursor.prepare("SELECT CAST(1 AS INTEGER)")?;
    cursor.execute()?;
    cursor.finalize();
    cursor.finalize();
    assert!(!cursor.is_active());
    assert_eq!(cursor.size(), None);
    Ok(())
}

#[test]
fn reopen_closes_the_previous_database() -> Result<(), Box<dyn std::error::Error>> {
    let driver = DuckdbDriver::new();
    driver.open(&unique_db_path("first"), "")?;
    let mut cursor = driver.create_cursor();
    cursor.prepare("CREATE TABLE only_here (id INTEGER)")?;
    cursor.execute()?;
    drop(cursor);

    driver.open(&unique_db_path("second"), "")?;
    assert!(driver.is_open());
    assert!(!driver.tables(TableKind::Tables)?.contains(&"only_here".to_string()));
    Ok(())
}

#[test]
fn failed_open_sets_the_error_state() {
    let driver = DuckdbDriver::new();
    let err = driver
        .open("/nonexistent-dir/no/such.duckdb", "")
        .expect_err("bogus path");
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(!driver.is_open());
    assert!(driver.is_open_error());
    assert!(driver.last_error().is_some());
}

#[test]
fn rollback_undoes_a_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let driver = DuckdbDriver::new();
    driver.open(&unique_db_path("txn"), "")?;
    let mut cursor = driver.create_cursor();
    cursor.prepare("CREATE TABLE t (id INTEGER PRIMARY KEY)")?;
    cursor.execute()?;
    cursor.prepare("INSERT INTO t VALUES (1)")?;
    cursor.execute()?;

    driver.begin_transaction()?;
    cursor.prepare("INSERT INTO t VALUES (2)")?;
    cursor.execute()?;
    // A failing statement inside the transaction does not poison rollback.
    cursor.prepare("INSERT INTO t VALUES (1)")?;
    assert!(cursor.execute().is_err());
    driver.rollback_transaction()?;

    cursor.prepare("SELECT count(*) FROM t")?;
    cursor.execute()?;
    let row = cursor.fetch_row(0)?.expect("count row");
    assert_eq!(row[0].as_int(), Some(1));
    Ok(())
}

#[test]
fn commit_keeps_transaction_work() -> Result<(), Box<dyn std::error::Error>> {
    let driver = DuckdbDriver::new();
    driver.open(&unique_db_path("commit"), "")?;
    let mut cursor = driver.create_cursor();
    cursor.prepare("CREATE TABLE t (id INTEGER)")?;
    cursor.execute()?;

    driver.begin_transaction()?;
    cursor.prepare("INSERT INTO t VALUES (1), (2)")?;
    cursor.execute()?;
    assert_eq!(cursor.rows_affected(), 2);
    driver.commit_transaction()?;

    cursor.prepare("SELECT count(*) FROM t")?;
    cursor.execute()?;
    assert_eq!(cursor.fetch_row(0)?.expect("row")[0].as_int(), Some(2));
    Ok(())
}

#[test]
fn transactions_require_an_open_driver() {
    let driver = DuckdbDriver::new();
    let err = driver.begin_transaction().expect_err("never opened");
    assert_eq!(err.category(), ErrorCategory::Connection);
}

#[test]
fn capability_set_is_fixed() {
    let driver = DuckdbDriver::new();
    assert!(driver.has_feature(DriverFeature::Transactions));
    assert!(driver.has_feature(DriverFeature::PreparedQueries));
    assert!(driver.has_feature(DriverFeature::PositionalPlaceholders));
    assert!(driver.has_feature(DriverFeature::Blob));
    assert!(driver.has_feature(DriverFeature::Unicode));
    assert!(driver.has_feature(DriverFeature::LastInsertId));
    assert!(driver.has_feature(DriverFeature::EventNotifications));
    assert!(!driver.has_feature(DriverFeature::QuerySize));
    assert!(!driver.has_feature(DriverFeature::BatchOperations));
    assert!(!driver.has_feature(DriverFeature::MultipleResultSets));
    assert!(!driver.has_feature(DriverFeature::CancelQuery));
    assert_eq!(
        driver.has_feature(DriverFeature::NamedPlaceholders),
        cfg!(feature = "named-placeholders")
    );
}

#[test]
fn read_only_mode_rejects_writes() -> Result<(), Box<dyn std::error::Error>> {
    let path = unique_db_path("readonly");
    let driver = DuckdbDriver::new();
    driver.open(&path, "")?;
    let mut cursor = driver.create_cursor();
    cursor.prepare("CREATE TABLE t (id INTEGER)")?;
    cursor.execute()?;
    drop(cursor);
    driver.close();

    driver.open(&path, "DUCKDB_OPEN_READONLY")?;
    let mut cursor = driver.create_cursor();
    let write = cursor
        .prepare("INSERT INTO t VALUES (1)")
        .and_then(|()| cursor.execute());
    assert!(write.is_err());
    Ok(())
}
