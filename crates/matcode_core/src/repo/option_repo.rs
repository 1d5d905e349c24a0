//! System option dictionaries (materials, surface finishes, units...).

use crate::repo::{ensure_connection_ready, RepoResult};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemOption {
    pub id: i64,
    pub module: String,
    pub cate: String,
    pub key: String,
    pub value: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub parent_key: Option<String>,
}

pub trait OptionRepository {
    /// Lists entries of one dictionary, optionally narrowed to a parent key.
    fn list_options(
        &self,
        module: &str,
        cate: &str,
        parent_key: Option<&str>,
    ) -> RepoResult<Vec<SystemOption>>;
    /// Lists every dictionary of a module keyed by `cate`.
    fn list_module_options(&self, module: &str) -> RepoResult<BTreeMap<String, Vec<SystemOption>>>;
}

/// SQLite-backed option repository.
pub struct SqliteOptionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOptionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["system_options"])?;
        Ok(Self::new(conn))
    }
}

impl OptionRepository for SqliteOptionRepository<'_> {
    fn list_options(
        &self,
        module: &str,
        cate: &str,
        parent_key: Option<&str>,
    ) -> RepoResult<Vec<SystemOption>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, module, cate, key, value, label, description, parent_key
             FROM system_options
             WHERE module = ?1
               AND cate = ?2
               AND (?3 IS NULL OR parent_key = ?3)
             ORDER BY key ASC;",
        )?;
        let mut rows = stmt.query(params![module, cate, parent_key])?;
        let mut options = Vec::new();
        while let Some(row) = rows.next()? {
            options.push(parse_option_row(row)?);
        }
        Ok(options)
    }

    fn list_module_options(&self, module: &str) -> RepoResult<BTreeMap<String, Vec<SystemOption>>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, module, cate, key, value, label, description, parent_key
             FROM system_options
             WHERE module = ?1
             ORDER BY cate ASC, key ASC;",
        )?;
        let mut rows = stmt.query([module])?;
        let mut grouped: BTreeMap<String, Vec<SystemOption>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let option = parse_option_row(row)?;
            grouped.entry(option.cate.clone()).or_default().push(option);
        }
        Ok(grouped)
    }
}

fn parse_option_row(row: &Row<'_>) -> RepoResult<SystemOption> {
    Ok(SystemOption {
        id: row.get("id")?,
        module: row.get("module")?,
        cate: row.get("cate")?,
        key: row.get("key")?,
        value: row.get("value")?,
        label: row.get("label")?,
        description: row.get("description")?,
        parent_key: row.get("parent_key")?,
    })
}
