//! Supplier master record.

use crate::model::user::validate_email;
use crate::model::{optional_text, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SupplierId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    /// Business code, unique across suppliers (e.g. `SUP001`).
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Supplier {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            contact_person: None,
            email: None,
            phone: None,
            address: None,
            country: None,
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Normalizes text fields. Codes are stored uppercase.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.code = require_text("supplier code", &self.code)?.to_ascii_uppercase();
        self.name = require_text("supplier name", &self.name)?;
        self.contact_person = optional_text(self.contact_person.as_deref());
        self.email = optional_text(self.email.as_deref());
        if let Some(email) = self.email.as_deref() {
            validate_email(email)?;
        }
        self.phone = optional_text(self.phone.as_deref());
        self.address = optional_text(self.address.as_deref());
        self.country = optional_text(self.country.as_deref());
        Ok(())
    }
}
