//! Item code generation.
//!
//! # Responsibility
//! - Preview the next item code without consuming a serial.
//! - Allocate serials atomically and format them per current settings.
//!
//! # Invariants
//! - A serial is consumed only when the surrounding transaction commits.
//! - The first serial of a fresh counter key is `serial_start`.
//! - Serials that do not fit `serial_digits` fail with `CodeSpaceExhausted`.

use crate::model::item_code::{CounterKey, ItemCode};
use crate::model::settings::SystemSettings;
use crate::model::user::{Actor, Permission, UserId};
use crate::repo::category_repo::SqliteCategoryRepository;
use crate::repo::counter_repo::{CounterRepository, SqliteCounterRepository};
use crate::repo::settings_repo::SqliteSettingsRepository;
use crate::service::category_service::CategoryService;
use crate::service::settings_service::load_settings;
use crate::service::{require_permission, ServiceError, ServiceResult};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Item code service bound to one connection.
pub struct CodeService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> CodeService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Returns the code the next allocation would produce.
    pub fn preview_item_code(&self, main: &str, sub: &str, spec: &str) -> ServiceResult<ItemCode> {
        let key = self.checked_key(main, sub, spec)?;
        let settings = load_settings(&SqliteSettingsRepository::try_new(self.conn)?)?;
        let last = SqliteCounterRepository::try_new(self.conn)?.get(&key)?;
        let next = last.saturating_add(1).max(settings.serial_start);
        format_code(&key, next, &settings)
    }

    /// Allocates and returns a new item code in its own IMMEDIATE transaction.
    pub fn generate_item_code(
        &self,
        actor: &Actor,
        main: &str,
        sub: &str,
        spec: &str,
    ) -> ServiceResult<ItemCode> {
        require_permission(actor, Permission::Apply)?;
        let key = self.checked_key(main, sub, spec)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let settings = load_settings(&SqliteSettingsRepository::new(&tx))?;
        let code = allocate_item_code(&tx, &key, Some(actor.user_id), &settings)?;
        tx.commit()?;
        Ok(code)
    }

    /// Last serial handed out for `key`, `0` when unused.
    pub fn current_serial(&self, key: &CounterKey) -> ServiceResult<u64> {
        Ok(SqliteCounterRepository::try_new(self.conn)?.get(key)?)
    }

    /// Sets the last handed-out serial for `key`.
    pub fn reset_counter(&self, actor: &Actor, key: &CounterKey, value: u64) -> ServiceResult<()> {
        require_permission(actor, Permission::Settings)?;
        SqliteCounterRepository::try_new(self.conn)?.reset(key, value)?;
        info!("event=counter_reset module=service status=ok key={key} value={value}");
        Ok(())
    }

    fn checked_key(&self, main: &str, sub: &str, spec: &str) -> ServiceResult<CounterKey> {
        let categories = CategoryService::new(SqliteCategoryRepository::try_new(self.conn)?);
        let selection = categories.validate_selection(main, sub, spec)?;
        Ok(CounterKey::new(
            &selection.main.code,
            &selection.sub.code,
            &selection.spec.code,
        )?)
    }
}

/// Allocates the next serial for `key` on `conn`.
///
/// Callers run this inside an IMMEDIATE transaction; on error the increment is
/// rolled back with it.
pub(crate) fn allocate_item_code(
    conn: &Connection,
    key: &CounterKey,
    used_by: Option<UserId>,
    settings: &SystemSettings,
) -> ServiceResult<ItemCode> {
    let serial = SqliteCounterRepository::new(conn).get_and_increment(
        key,
        used_by,
        settings.serial_start,
    )?;
    let code = format_code(key, serial, settings)?;
    info!("event=item_code_allocate module=service status=ok key={key} serial={serial}");
    Ok(code)
}

fn format_code(key: &CounterKey, serial: u64, settings: &SystemSettings) -> ServiceResult<ItemCode> {
    key.item_code(serial, settings.serial_digits).ok_or_else(|| {
        warn!(
            "event=item_code_allocate module=service status=error key={key} reason=code_space_exhausted"
        );
        ServiceError::CodeSpaceExhausted {
            key: key.clone(),
            digits: settings.serial_digits,
        }
    })
}
