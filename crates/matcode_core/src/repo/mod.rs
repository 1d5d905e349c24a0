//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Repositories borrow a connection; callers that need atomicity across
//!   repositories build them over one `rusqlite::Transaction`.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod application_repo;
pub mod attachment_repo;
pub mod category_repo;
pub mod counter_repo;
pub mod export_log_repo;
pub mod option_repo;
pub mod packaging_repo;
pub mod settings_repo;
pub mod supplier_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Shared repository error.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    /// Target row does not exist.
    NotFound { entity: &'static str, key: String },
    /// Write violates a uniqueness constraint.
    Conflict { entity: &'static str, key: String },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, key: impl ToString) -> Self {
        Self::Conflict {
            entity,
            key: key.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Conflict { entity, key } => write!(f, "{entity} already exists: {key}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Maps a UNIQUE/PRIMARY KEY violation to `Conflict`, anything else to `Db`.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    entity: &'static str,
    key: impl ToString,
) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                ) =>
        {
            RepoError::conflict(entity, key)
        }
        _ => RepoError::from(err),
    }
}

/// Checks schema version and required tables before a repository is used.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(value: Option<String>, column: &str) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

/// Appends `LIMIT`/`OFFSET` clauses with bound values.
pub(crate) fn push_pagination(
    sql: &mut String,
    bind_values: &mut Vec<rusqlite::types::Value>,
    limit: Option<u32>,
    offset: u32,
) {
    use rusqlite::types::Value;

    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(offset)));
    }
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern and wraps the
/// needle in `%`.
pub(crate) fn like_contains(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::{like_contains, push_pagination};

    #[test]
    fn like_contains_escapes_wildcards() {
        assert_eq!(like_contains("H01"), "%H01%");
        assert_eq!(like_contains("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn pagination_without_limit_uses_negative_limit() {
        let mut sql = String::from("SELECT 1");
        let mut values = Vec::new();
        push_pagination(&mut sql, &mut values, None, 5);
        assert_eq!(sql, "SELECT 1 LIMIT -1 OFFSET ?");
        assert_eq!(values.len(), 1);
    }
}
