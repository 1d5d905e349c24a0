//! Domain model for material-code applications.
//!
//! # Responsibility
//! - Define the canonical records shared by repositories and services.
//! - Own field-level validation so every write path enforces the same rules.
//!
//! # Invariants
//! - Records carry stable ids (`Uuid` for user-created rows, integer ids for
//!   reference catalog rows).
//! - Timestamps are epoch milliseconds.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod application;
pub mod approval;
pub mod attachment;
pub mod category;
pub mod export_log;
pub mod item_code;
pub mod packaging;
pub mod settings;
pub mod supplier;
pub mod user;

/// Field-level validation failure raised before any persistence call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Code segment does not match its expected shape.
    InvalidCode { field: &'static str, value: String },
    /// Dimension value is negative or not finite.
    InvalidDimension(&'static str),
    /// Quantity must be strictly positive.
    NonPositiveQuantity(&'static str),
    /// Numeric field outside its allowed range.
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    /// Email does not look like `local@domain`.
    InvalidEmail(String),
    /// Rejected record has no reject reason.
    MissingRejectReason,
    /// Setting text does not parse as the setting's declared type.
    InvalidSettingValue { key: String, value: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::InvalidCode { field, value } => write!(f, "invalid {field} code `{value}`"),
            Self::InvalidDimension(field) => {
                write!(f, "{field} must be a finite non-negative number")
            }
            Self::NonPositiveQuantity(field) => write!(f, "{field} must be greater than zero"),
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} must be within {min}..={max}, got {value}"),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
            Self::MissingRejectReason => write!(f, "rejected application requires a reason"),
            Self::InvalidSettingValue { key, value } => {
                write!(f, "invalid value `{value}` for setting {key}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and rejects it when nothing remains.
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(trimmed.to_string())
}

/// Normalizes optional free text: trims, and maps blank to `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::{optional_text, require_text, ValidationError};

    #[test]
    fn require_text_trims_and_rejects_blank() {
        assert_eq!(require_text("name", "  Knob ").unwrap(), "Knob");
        assert_eq!(
            require_text("name", "   ").unwrap_err(),
            ValidationError::BlankField("name")
        );
    }

    #[test]
    fn optional_text_maps_blank_to_none() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" a ")), Some("a".to_string()));
        assert_eq!(optional_text(None), None);
    }
}
