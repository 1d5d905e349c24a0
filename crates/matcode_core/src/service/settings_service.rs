//! Business settings use-cases.
//!
//! # Invariants
//! - Writes require `Permission::Settings`.
//! - Stored settings always project onto a valid [`SystemSettings`].

use crate::model::settings::{SettingEntry, SettingType, SettingValue, SystemSettings};
use crate::model::user::{Actor, Permission};
use crate::model::ValidationError;
use crate::repo::settings_repo::SettingsRepository;
use crate::service::{require_permission, ServiceError, ServiceResult};
use log::info;
use std::collections::BTreeMap;

/// Settings service facade over repository implementations.
pub struct SettingsService<R: SettingsRepository> {
    repo: R,
}

impl<R: SettingsRepository> SettingsService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Loads typed settings; missing keys fall back to defaults.
    pub fn load(&self) -> ServiceResult<SystemSettings> {
        load_settings(&self.repo)
    }

    /// Raw stored entries, sorted by key.
    pub fn entries(&self) -> ServiceResult<Vec<SettingEntry>> {
        Ok(self.repo.list_settings()?)
    }

    pub fn save(&self, actor: &Actor, settings: &SystemSettings) -> ServiceResult<SystemSettings> {
        require_permission(actor, Permission::Settings)?;
        settings.validate()?;
        self.repo
            .upsert_settings(&settings.to_values(), Some(actor.user_id))?;
        info!(
            "event=settings_save module=service status=ok serial_digits={} approval_level={} auto_approve={}",
            settings.serial_digits, settings.approval_level, settings.auto_approve
        );
        self.load()
    }

    /// Sets one key from text.
    ///
    /// Business keys always use their declared type; other keys keep the type
    /// of the stored entry, or become strings. Business keys are validated by
    /// re-projecting the full settings before the write, so a value that does
    /// not project (such as `4.5` digits) is rejected and nothing is stored.
    pub fn set_value(&self, actor: &Actor, key: &str, raw: &str) -> ServiceResult<SettingEntry> {
        require_permission(actor, Permission::Settings)?;
        let key = key.trim();
        let existing = self.repo.get_setting(key)?;
        let setting_type = SystemSettings::key_type(key)
            .or_else(|| existing.as_ref().map(|entry| entry.value.setting_type()))
            .unwrap_or(SettingType::String);
        let value = SettingValue::decode(setting_type, raw).ok_or_else(|| {
            ValidationError::InvalidSettingValue {
                key: key.to_string(),
                value: raw.to_string(),
            }
        })?;

        let mut values = self.values()?;
        values.insert(key.to_string(), value.clone());
        SystemSettings::from_values(&values)?;

        self.repo.upsert_setting(key, &value, Some(actor.user_id))?;
        info!("event=settings_set module=service status=ok key={key}");
        self.repo
            .get_setting(key)?
            .ok_or(ServiceError::InconsistentState("setting missing after write"))
    }

    /// Restores every business setting to its default.
    pub fn reset(&self, actor: &Actor) -> ServiceResult<SystemSettings> {
        self.save(actor, &SystemSettings::default())
    }

    fn values(&self) -> ServiceResult<BTreeMap<String, SettingValue>> {
        Ok(self
            .repo
            .list_settings()?
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect())
    }
}

/// Loads typed settings from any settings repository.
pub(crate) fn load_settings(repo: &impl SettingsRepository) -> ServiceResult<SystemSettings> {
    let values: BTreeMap<String, SettingValue> = repo
        .list_settings()?
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect();
    Ok(SystemSettings::from_values(&values)?)
}
