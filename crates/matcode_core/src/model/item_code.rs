//! Item code and counter key value types.
//!
//! # Responsibility
//! - Parse and format material item codes (`H01.C.00001`).
//! - Derive the per-category counter key (`H01.C`) used for serial allocation.
//!
//! # Invariants
//! - Main category: one uppercase ASCII letter.
//! - Sub category: two ASCII digits.
//! - Spec category: one uppercase ASCII letter.
//! - Serial: 4 to 6 ASCII digits, zero padded, never zero.

use crate::model::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Smallest supported serial width.
pub const MIN_SERIAL_DIGITS: u32 = 4;
/// Largest supported serial width.
pub const MAX_SERIAL_DIGITS: u32 = 6;

static MAIN_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]$").expect("valid main category regex"));
static SUB_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2}$").expect("valid sub category regex"));
static SPEC_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]$").expect("valid spec category regex"));
static ITEM_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z])([0-9]{2})\.([A-Z])\.([0-9]{4,6})$").expect("valid item code regex")
});

/// Validates a main category code segment.
pub fn validate_main_code(value: &str) -> Result<(), ValidationError> {
    check_segment(&MAIN_CODE_RE, "main_category", value)
}

/// Validates a sub category code segment.
pub fn validate_sub_code(value: &str) -> Result<(), ValidationError> {
    check_segment(&SUB_CODE_RE, "sub_category", value)
}

/// Validates a spec category code segment.
pub fn validate_spec_code(value: &str) -> Result<(), ValidationError> {
    check_segment(&SPEC_CODE_RE, "spec_category", value)
}

fn check_segment(re: &Regex, field: &'static str, value: &str) -> Result<(), ValidationError> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCode {
            field,
            value: value.to_string(),
        })
    }
}

/// Counter key shared by every item code in one category combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CounterKey {
    main: String,
    sub: String,
    spec: String,
}

impl CounterKey {
    /// Builds a key from the three category code segments.
    pub fn new(main: &str, sub: &str, spec: &str) -> Result<Self, ValidationError> {
        let main = main.trim();
        let sub = sub.trim();
        let spec = spec.trim();
        validate_main_code(main)?;
        validate_sub_code(sub)?;
        validate_spec_code(spec)?;
        Ok(Self {
            main: main.to_string(),
            sub: sub.to_string(),
            spec: spec.to_string(),
        })
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn sub(&self) -> &str {
        &self.sub
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Formats the item code for `serial` padded to `digits`.
    ///
    /// Returns `None` when `serial` is zero or needs more than `digits`
    /// characters.
    pub fn item_code(&self, serial: u64, digits: u32) -> Option<ItemCode> {
        if serial == 0 || !(MIN_SERIAL_DIGITS..=MAX_SERIAL_DIGITS).contains(&digits) {
            return None;
        }
        if serial > max_serial(digits) {
            return None;
        }
        Some(ItemCode {
            key: self.clone(),
            serial,
            digits,
        })
    }
}

impl Display for CounterKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}.{}", self.main, self.sub, self.spec)
    }
}

impl FromStr for CounterKey {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidCode {
            field: "counter_key",
            value: value.to_string(),
        };
        let (head, spec) = value.split_once('.').ok_or_else(invalid)?;
        if head.len() != 3 || !head.is_char_boundary(1) {
            return Err(invalid());
        }
        let (main, sub) = head.split_at(1);
        Self::new(main, sub, spec).map_err(|_| invalid())
    }
}

impl TryFrom<String> for CounterKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CounterKey> for String {
    fn from(value: CounterKey) -> Self {
        value.to_string()
    }
}

/// Fully generated material item code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemCode {
    key: CounterKey,
    serial: u64,
    digits: u32,
}

impl ItemCode {
    pub fn key(&self) -> &CounterKey {
        &self.key
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Width of the serial segment as stored.
    pub fn digits(&self) -> u32 {
        self.digits
    }
}

impl Display for ItemCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.key,
            self.serial,
            width = self.digits as usize
        )
    }
}

impl FromStr for ItemCode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidCode {
            field: "item_code",
            value: value.to_string(),
        };
        let captures = ITEM_CODE_RE.captures(value.trim()).ok_or_else(invalid)?;
        let key = CounterKey::new(&captures[1], &captures[2], &captures[3])?;
        let serial_text = &captures[4];
        let serial: u64 = serial_text.parse().map_err(|_| invalid())?;
        key.item_code(serial, serial_text.len() as u32)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for ItemCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemCode> for String {
    fn from(value: ItemCode) -> Self {
        value.to_string()
    }
}

/// Largest serial representable with `digits` characters.
pub fn max_serial(digits: u32) -> u64 {
    10u64.pow(digits) - 1
}

#[cfg(test)]
mod tests {
    use super::{max_serial, CounterKey, ItemCode};
    use crate::model::ValidationError;

    #[test]
    fn counter_key_formats_main_sub_and_spec() {
        let key = CounterKey::new("H", "01", "C").expect("valid key");
        assert_eq!(key.to_string(), "H01.C");
    }

    #[test]
    fn item_code_pads_serial_to_configured_width() {
        let key = CounterKey::new("S", "03", "F").expect("valid key");
        let code = key.item_code(42, 5).expect("serial fits");
        assert_eq!(code.to_string(), "S03.F.00042");

        let code = key.item_code(7, 4).expect("serial fits");
        assert_eq!(code.to_string(), "S03.F.0007");
    }

    #[test]
    fn item_code_rejects_overflowing_serial() {
        let key = CounterKey::new("H", "01", "A").expect("valid key");
        assert!(key.item_code(9_999, 4).is_some());
        assert!(key.item_code(10_000, 4).is_none());
        assert!(key.item_code(0, 5).is_none());
        assert!(key.item_code(1, 7).is_none());
        assert_eq!(max_serial(6), 999_999);
    }

    #[test]
    fn parses_item_code_back_into_segments() {
        let code: ItemCode = "M02.P.000123".parse().expect("valid item code");
        assert_eq!(code.key().main(), "M");
        assert_eq!(code.key().sub(), "02");
        assert_eq!(code.key().spec(), "P");
        assert_eq!(code.serial(), 123);
        assert_eq!(code.digits(), 6);
    }

    #[test]
    fn rejects_malformed_segments() {
        let err = CounterKey::new("h", "01", "C").expect_err("lowercase main must fail");
        assert!(matches!(
            err,
            ValidationError::InvalidCode {
                field: "main_category",
                ..
            }
        ));
        assert!(CounterKey::new("H", "1", "C").is_err());
        assert!(CounterKey::new("H", "01", "CC").is_err());
        assert!("H01C00001".parse::<ItemCode>().is_err());
        assert!("H01.C.123".parse::<ItemCode>().is_err());
    }

    #[test]
    fn counter_key_parses_from_text() {
        let key: CounterKey = "F02.C".parse().expect("valid key text");
        assert_eq!(key, CounterKey::new("F", "02", "C").unwrap());
        assert!("F2.C".parse::<CounterKey>().is_err());
        assert!("報02.C".parse::<CounterKey>().is_err());
    }
}
