use quotebook_core::db::migrations::latest_version;
use quotebook_core::db::{open_db, open_db_in_memory, DbError};
use quotebook_core::{Quote, QuoteStore, SqliteQuoteStore};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "kv_store");
}

#[test]
fn open_db_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("quotebook.sqlite3");

    let conn = open_db(&path).unwrap();
    assert!(path.exists());
    assert_eq!(schema_version(&conn), latest_version());
}

#[test]
fn quotes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotebook.sqlite3");

    {
        let store = SqliteQuoteStore::try_new(open_db(&path).unwrap()).unwrap();
        store
            .save_quotes(&[Quote::new("A", "X"), Quote::with_id("2", "B", "Y")])
            .unwrap();
        store.save_last_category(Some("Y")).unwrap();
    }

    let store = SqliteQuoteStore::try_new(open_db(&path).unwrap()).unwrap();
    assert_eq!(
        store.load_quotes().unwrap(),
        Some(vec![Quote::new("A", "X"), Quote::with_id("2", "B", "Y")])
    );
    assert_eq!(store.load_last_category().unwrap().as_deref(), Some("Y"));
}

#[test]
fn corrupted_quotes_value_is_reported_not_masked() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO kv_store (key, value) VALUES ('quotes', '{\"not\":\"an array\"}');",
        [],
    )
    .unwrap();

    let store = SqliteQuoteStore::try_new(conn).unwrap();
    let err = store.load_quotes().unwrap_err();
    assert!(err.to_string().contains("invalid persisted quote data"));
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
