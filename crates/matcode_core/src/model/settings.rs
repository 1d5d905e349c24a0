//! Runtime business settings.
//!
//! # Responsibility
//! - Define the typed key/value rows stored in `system_settings`.
//! - Project those rows onto [`SystemSettings`] with defaults for missing keys.
//!
//! # Invariants
//! - `serial_digits` is 4, 5 or 6.
//! - `serial_start` is at least 1.
//! - `approval_level` is within 1..=3.

use crate::model::item_code::{MAX_SERIAL_DIGITS, MIN_SERIAL_DIGITS};
use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const KEY_SERIAL_DIGITS: &str = "serial_digits";
pub const KEY_SERIAL_START: &str = "serial_start";
pub const KEY_AUTO_APPROVE: &str = "auto_approve";
pub const KEY_EMAIL_NOTIFY: &str = "email_notify";
pub const KEY_APPROVAL_LEVEL: &str = "approval_level";

pub const MIN_APPROVAL_LEVEL: u32 = 1;
pub const MAX_APPROVAL_LEVEL: u32 = 3;

/// Declared type of a stored setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    String,
    Number,
    Boolean,
    Json,
}

impl SettingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Decoded setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Number(f64),
    Text(String),
    Json(serde_json::Value),
}

impl SettingValue {
    pub fn setting_type(&self) -> SettingType {
        match self {
            Self::Boolean(_) => SettingType::Boolean,
            Self::Number(_) => SettingType::Number,
            Self::Text(_) => SettingType::String,
            Self::Json(_) => SettingType::Json,
        }
    }

    /// Decodes a stored text value according to its declared type.
    ///
    /// Returns `None` when the text does not parse as `setting_type`.
    pub fn decode(setting_type: SettingType, raw: &str) -> Option<Self> {
        match setting_type {
            SettingType::String => Some(Self::Text(raw.to_string())),
            SettingType::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(Self::Number),
            SettingType::Boolean => match raw.trim() {
                "true" => Some(Self::Boolean(true)),
                "false" => Some(Self::Boolean(false)),
                _ => None,
            },
            SettingType::Json => serde_json::from_str(raw).ok().map(Self::Json),
        }
    }

    /// Encodes the value as stored text.
    pub fn encode(&self) -> String {
        match self {
            Self::Boolean(value) => value.to_string(),
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", *value as i64)
            }
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value.clone(),
            Self::Json(value) => value.to_string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer view of a whole-number value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(value) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }
}

/// Stored setting row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub key: String,
    pub value: SettingValue,
    pub updated_at: i64,
}

/// Typed view of the business settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Zero-padded width of the item code serial.
    pub serial_digits: u32,
    /// First serial handed out for a fresh counter key.
    pub serial_start: u64,
    /// Approve applications at submit time.
    pub auto_approve: bool,
    pub email_notify: bool,
    /// Number of approvals required before an application is approved.
    pub approval_level: u32,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            serial_digits: 5,
            serial_start: 1,
            auto_approve: false,
            email_notify: true,
            approval_level: 1,
        }
    }
}

impl SystemSettings {
    /// Builds settings from decoded rows. Missing keys fall back to
    /// defaults; a present key of the wrong type or with a fractional number
    /// is `InvalidSettingValue`. The result is validated.
    pub fn from_values(values: &BTreeMap<String, SettingValue>) -> Result<Self, ValidationError> {
        let defaults = Self::default();
        let int = |key: &'static str| -> Result<Option<i64>, ValidationError> {
            values
                .get(key)
                .map(|value| value.as_i64().ok_or_else(|| invalid_value(key, value)))
                .transpose()
        };
        let flag = |key: &'static str| -> Result<Option<bool>, ValidationError> {
            values
                .get(key)
                .map(|value| value.as_bool().ok_or_else(|| invalid_value(key, value)))
                .transpose()
        };

        let settings = Self {
            serial_digits: match int(KEY_SERIAL_DIGITS)? {
                Some(value) => to_u32(KEY_SERIAL_DIGITS, value)?,
                None => defaults.serial_digits,
            },
            serial_start: match int(KEY_SERIAL_START)? {
                Some(value) => u64::try_from(value).map_err(|_| ValidationError::OutOfRange {
                    field: KEY_SERIAL_START,
                    value,
                    min: 1,
                    max: i64::MAX,
                })?,
                None => defaults.serial_start,
            },
            auto_approve: flag(KEY_AUTO_APPROVE)?.unwrap_or(defaults.auto_approve),
            email_notify: flag(KEY_EMAIL_NOTIFY)?.unwrap_or(defaults.email_notify),
            approval_level: match int(KEY_APPROVAL_LEVEL)? {
                Some(value) => to_u32(KEY_APPROVAL_LEVEL, value)?,
                None => defaults.approval_level,
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Declared type of a business key, `None` for keys outside the typed set.
    pub fn key_type(key: &str) -> Option<SettingType> {
        match key {
            KEY_SERIAL_DIGITS | KEY_SERIAL_START | KEY_APPROVAL_LEVEL => Some(SettingType::Number),
            KEY_AUTO_APPROVE | KEY_EMAIL_NOTIFY => Some(SettingType::Boolean),
            _ => None,
        }
    }

    /// Flattens settings into typed rows for storage.
    pub fn to_values(&self) -> Vec<(&'static str, SettingValue)> {
        vec![
            (KEY_SERIAL_DIGITS, SettingValue::Number(f64::from(self.serial_digits))),
            (KEY_SERIAL_START, SettingValue::Number(self.serial_start as f64)),
            (KEY_AUTO_APPROVE, SettingValue::Boolean(self.auto_approve)),
            (KEY_EMAIL_NOTIFY, SettingValue::Boolean(self.email_notify)),
            (KEY_APPROVAL_LEVEL, SettingValue::Number(f64::from(self.approval_level))),
        ]
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_SERIAL_DIGITS..=MAX_SERIAL_DIGITS).contains(&self.serial_digits) {
            return Err(ValidationError::OutOfRange {
                field: KEY_SERIAL_DIGITS,
                value: i64::from(self.serial_digits),
                min: i64::from(MIN_SERIAL_DIGITS),
                max: i64::from(MAX_SERIAL_DIGITS),
            });
        }
        let max_start = crate::model::item_code::max_serial(self.serial_digits);
        if self.serial_start == 0 || self.serial_start > max_start {
            return Err(ValidationError::OutOfRange {
                field: KEY_SERIAL_START,
                value: i64::try_from(self.serial_start).unwrap_or(i64::MAX),
                min: 1,
                max: max_start as i64,
            });
        }
        if !(MIN_APPROVAL_LEVEL..=MAX_APPROVAL_LEVEL).contains(&self.approval_level) {
            return Err(ValidationError::OutOfRange {
                field: KEY_APPROVAL_LEVEL,
                value: i64::from(self.approval_level),
                min: i64::from(MIN_APPROVAL_LEVEL),
                max: i64::from(MAX_APPROVAL_LEVEL),
            });
        }
        Ok(())
    }
}

fn invalid_value(key: &str, value: &SettingValue) -> ValidationError {
    ValidationError::InvalidSettingValue {
        key: key.to_string(),
        value: value.encode(),
    }
}

fn to_u32(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    u32::try_from(value).map_err(|_| ValidationError::OutOfRange {
        field,
        value,
        min: 0,
        max: i64::from(u32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        SettingType, SettingValue, SystemSettings, KEY_APPROVAL_LEVEL, KEY_AUTO_APPROVE,
        KEY_SERIAL_DIGITS,
    };
    use crate::model::ValidationError;
    use std::collections::BTreeMap;

    #[test]
    fn decode_respects_declared_type() {
        assert_eq!(
            SettingValue::decode(SettingType::Number, "5"),
            Some(SettingValue::Number(5.0))
        );
        assert_eq!(
            SettingValue::decode(SettingType::Boolean, "true"),
            Some(SettingValue::Boolean(true))
        );
        assert_eq!(SettingValue::decode(SettingType::Boolean, "yes"), None);
        assert_eq!(SettingValue::decode(SettingType::Number, "five"), None);
        assert!(matches!(
            SettingValue::decode(SettingType::Json, r#"{"a":1}"#),
            Some(SettingValue::Json(_))
        ));
    }

    #[test]
    fn encode_writes_whole_numbers_without_fraction() {
        assert_eq!(SettingValue::Number(5.0).encode(), "5");
        assert_eq!(SettingValue::Number(2.5).encode(), "2.5");
        assert_eq!(SettingValue::Boolean(false).encode(), "false");
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = SystemSettings::from_values(&BTreeMap::new()).expect("defaults are valid");
        assert_eq!(settings, SystemSettings::default());
        assert_eq!(settings.serial_digits, 5);
        assert!(settings.email_notify);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut values = BTreeMap::new();
        values.insert(KEY_SERIAL_DIGITS.to_string(), SettingValue::Number(7.0));
        assert!(matches!(
            SystemSettings::from_values(&values),
            Err(ValidationError::OutOfRange {
                field: "serial_digits",
                ..
            })
        ));

        let mut values = BTreeMap::new();
        values.insert(KEY_APPROVAL_LEVEL.to_string(), SettingValue::Number(0.0));
        assert!(SystemSettings::from_values(&values).is_err());

        let settings = SystemSettings {
            serial_digits: 4,
            serial_start: 10_000,
            ..SystemSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn present_keys_of_the_wrong_shape_are_rejected() {
        let mut values = BTreeMap::new();
        values.insert(KEY_SERIAL_DIGITS.to_string(), SettingValue::Number(4.5));
        assert!(matches!(
            SystemSettings::from_values(&values),
            Err(ValidationError::InvalidSettingValue { ref key, ref value })
                if key == "serial_digits" && value == "4.5"
        ));

        let mut values = BTreeMap::new();
        values.insert(KEY_AUTO_APPROVE.to_string(), SettingValue::Text("yes".to_string()));
        assert!(matches!(
            SystemSettings::from_values(&values),
            Err(ValidationError::InvalidSettingValue { .. })
        ));

        assert_eq!(SystemSettings::key_type("serial_start"), Some(SettingType::Number));
        assert_eq!(SystemSettings::key_type("company_name"), None);
    }
}
