//! Schema and reference-data migrations.
//!
//! # Invariants
//! - Versions are strictly increasing; the last one is [`latest_version`].
//! - Pending migrations run in one transaction. A failure rolls back the
//!   whole batch and reports the failing version as `DbError::Migration`.
//! - `PRAGMA user_version` always equals the last committed version.

use crate::db::{DbError, DbResult};
use log::{debug, error};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "schema",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "reference_data",
        sql: include_str!("0002_reference_data.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Schema version stored in the database file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings the connection up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_set(conn, MIGRATIONS)
}

fn apply_set(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    let current = schema_version(conn)?;
    let latest = migrations.last().map_or(0, |migration| migration.version);
    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|migration| migration.version > current)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in pending {
        let applied = tx.execute_batch(migration.sql).and_then(|()| {
            tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
        });
        if let Err(source) = applied {
            error!(
                "event=db_migrate module=db status=error version={} name={}",
                migration.version, migration.name
            );
            return Err(DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            });
        }
        debug!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;
    Ok(())
}
