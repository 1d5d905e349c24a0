use matcode_core::db::migrations::latest_version;
use matcode_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "user_profiles",
        "product_categories",
        "suppliers",
        "applications",
        "packaging_categories",
        "packaging_options",
        "category_packaging_defaults",
        "packaging_templates",
        "application_packaging",
        "application_packaging_sections",
        "code_counters",
        "approval_logs",
        "attachments",
        "export_logs",
        "system_settings",
        "system_options",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reference_data_is_seeded() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM product_categories WHERE level = 1"), 8);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM product_categories WHERE level = 2"), 36);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM product_categories WHERE level = 3"), 27);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM packaging_categories"), 8);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM packaging_options"), 42);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM system_settings"), 5);
    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM category_packaging_defaults WHERE main_category_code = 'H'"
        ),
        7
    );
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();

    let result = conn.execute(
        "INSERT INTO approval_logs (id, application_id, action) VALUES ('log-1', 'missing', 'SUBMIT');",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matcode.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_eq!(
        count(&conn_second, "SELECT COUNT(*) FROM product_categories WHERE level = 1"),
        8
    );
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

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

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
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
