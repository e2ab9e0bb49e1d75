use rusqlite::Connection;
use syncline_core::db::migrations::{apply_migrations, current_version, latest_version};
use syncline_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn at_least_one_migration_is_registered() {
    assert!(latest_version() > 0);
}

#[test]
fn opening_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(current_version(&conn).unwrap(), latest_version());

    let table: String = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'entities';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(table, "entities");
}

#[test]
fn reopening_a_database_file_is_idempotent_and_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entities.db");

    {
        let conn = open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO entities (collection, id, document_id, fields)
             VALUES ('lists', '1', 'doc-1', '{}');",
            [],
        )
        .unwrap();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(current_version(&conn).unwrap(), latest_version());
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM entities;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn newer_schema_versions_are_rejected() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA user_version = 9999;").unwrap();

    match apply_migrations(&mut conn) {
        Err(DbError::UnsupportedSchemaVersion {
            db_version: 9999,
            latest_supported,
        }) => assert_eq!(latest_supported, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(()) => panic!("expected unsupported schema version error"),
    }
}

#[test]
fn migrations_are_idempotent_on_an_up_to_date_connection() {
    let mut conn = open_db_in_memory().unwrap();
    apply_migrations(&mut conn).unwrap();
    assert_eq!(current_version(&conn).unwrap(), latest_version());
}
