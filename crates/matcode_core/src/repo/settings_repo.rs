//! Typed key/value settings repository.
//!
//! # Invariants
//! - Values are stored as text together with their declared type.
//! - Rows whose text does not decode as their declared type are reported as
//!   `InvalidData`, never silently defaulted.

use crate::model::settings::{SettingEntry, SettingType, SettingValue};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

pub trait SettingsRepository {
    fn list_settings(&self) -> RepoResult<Vec<SettingEntry>>;
    fn get_setting(&self, key: &str) -> RepoResult<Option<SettingEntry>>;
    fn upsert_setting(
        &self,
        key: &str,
        value: &SettingValue,
        updated_by: Option<UserId>,
    ) -> RepoResult<()>;
    /// Upserts every entry in one transaction.
    fn upsert_settings(
        &self,
        entries: &[(&str, SettingValue)],
        updated_by: Option<UserId>,
    ) -> RepoResult<()>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["system_settings"])?;
        Ok(Self::new(conn))
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn list_settings(&self) -> RepoResult<Vec<SettingEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT setting_key, setting_value, setting_type, updated_at
             FROM system_settings
             ORDER BY setting_key ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_setting_row(row)?);
        }
        Ok(entries)
    }

    fn get_setting(&self, key: &str) -> RepoResult<Option<SettingEntry>> {
        self.conn
            .query_row(
                "SELECT setting_key, setting_value, setting_type, updated_at
                 FROM system_settings
                 WHERE setting_key = ?1;",
                [key],
                |row| Ok(parse_setting_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn upsert_setting(
        &self,
        key: &str,
        value: &SettingValue,
        updated_by: Option<UserId>,
    ) -> RepoResult<()> {
        write_setting(self.conn, key, value, updated_by)
    }

    fn upsert_settings(
        &self,
        entries: &[(&str, SettingValue)],
        updated_by: Option<UserId>,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (key, value) in entries {
            write_setting(&tx, key, value, updated_by)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn write_setting(
    conn: &Connection,
    key: &str,
    value: &SettingValue,
    updated_by: Option<UserId>,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO system_settings (setting_key, setting_value, setting_type, updated_by_id)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            setting_type = excluded.setting_type,
            updated_by_id = excluded.updated_by_id,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![
            key,
            value.encode(),
            value.setting_type().as_str(),
            updated_by.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

fn parse_setting_row(row: &Row<'_>) -> RepoResult<SettingEntry> {
    let key: String = row.get("setting_key")?;
    let raw: String = row.get("setting_value")?;
    let type_text: String = row.get("setting_type")?;
    let setting_type = SettingType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid setting type `{type_text}` in system_settings.setting_type"
        ))
    })?;
    let value = SettingValue::decode(setting_type, &raw).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "setting `{key}` does not decode as {}",
            setting_type.as_str()
        ))
    })?;

    Ok(SettingEntry {
        key,
        value,
        updated_at: row.get("updated_at")?,
    })
}
