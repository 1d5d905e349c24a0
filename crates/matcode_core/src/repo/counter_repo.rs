//! Item code serial counters.
//!
//! # Invariants
//! - One row per counter key; `counter` stores the last serial handed out.
//! - `get_and_increment` is a single statement, so callers that wrap it in an
//!   IMMEDIATE transaction get serialized allocation.

use crate::model::item_code::CounterKey;
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for code counters.
pub trait CounterRepository {
    /// Allocates the next serial for `key` and returns it.
    ///
    /// A fresh key starts at `start`; an existing key continues from its last
    /// value but never below `start`.
    fn get_and_increment(
        &self,
        key: &CounterKey,
        used_by: Option<UserId>,
        start: u64,
    ) -> RepoResult<u64>;
    /// Returns the last serial handed out, `0` when the key is unused.
    fn get(&self, key: &CounterKey) -> RepoResult<u64>;
    /// Sets the last handed-out serial, creating the row when missing.
    fn reset(&self, key: &CounterKey, value: u64) -> RepoResult<()>;
}

/// SQLite-backed counter repository.
pub struct SqliteCounterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCounterRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["code_counters"])?;
        Ok(Self::new(conn))
    }
}

impl CounterRepository for SqliteCounterRepository<'_> {
    fn get_and_increment(
        &self,
        key: &CounterKey,
        used_by: Option<UserId>,
        start: u64,
    ) -> RepoResult<u64> {
        let start = to_db_serial(start)?;
        let next: i64 = self.conn.query_row(
            "INSERT INTO code_counters (key, counter, last_used_date, last_used_by_id)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000), ?3)
             ON CONFLICT(key) DO UPDATE SET
                counter = MAX(code_counters.counter + 1, excluded.counter),
                last_used_date = excluded.last_used_date,
                last_used_by_id = excluded.last_used_by_id
             RETURNING counter;",
            params![key.to_string(), start, used_by.map(|id| id.to_string())],
            |row| row.get(0),
        )?;
        from_db_serial(next)
    }

    fn get(&self, key: &CounterKey) -> RepoResult<u64> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT counter FROM code_counters WHERE key = ?1;",
                [key.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        value.map_or(Ok(0), from_db_serial)
    }

    fn reset(&self, key: &CounterKey, value: u64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO code_counters (key, counter)
             VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET counter = excluded.counter;",
            params![key.to_string(), to_db_serial(value)?],
        )?;
        Ok(())
    }
}

fn to_db_serial(value: u64) -> RepoResult<i64> {
    i64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("counter value `{value}` exceeds i64")))
}

fn from_db_serial(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("negative counter `{value}` in code_counters.counter"))
    })
}
