use dlayer_core::db::migrations::{apply_migrations, latest_version, schema_version};
use dlayer_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "documents");
    assert_table_exists(&conn, "document_indexes");
}

#[test]
fn opening_same_store_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dlayer.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO documents (db_name, collection, doc_id, body) VALUES ('main', 'logs', 'a', '{}');",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    let rows: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM documents;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn reapplying_migrations_is_a_no_op() {
    let mut conn = Connection::open_in_memory().unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 0);

    assert_eq!(apply_migrations(&mut conn).unwrap(), latest_version());
    assert_eq!(apply_migrations(&mut conn).unwrap(), latest_version());
    assert_table_exists(&conn, "documents");
}

#[test]
fn document_ids_are_unique_per_collection() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO documents (db_name, collection, doc_id, body) VALUES (?1, ?2, 'same', '{}');";

    conn.execute(insert, ["main", "logs"]).unwrap();
    conn.execute(insert, ["main", "audit"]).unwrap();
    conn.execute(insert, ["other", "logs"]).unwrap();
    assert!(conn.execute(insert, ["main", "logs"]).is_err());
}

#[test]
fn opening_store_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::SchemaTooNew { found, supported } => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
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
