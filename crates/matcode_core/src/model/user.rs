//! User profiles, roles and the role → permission matrix.

use crate::model::{optional_text, require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable user identifier.
pub type UserId = Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Approver,
    Applicant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Approver => "approver",
            Self::Applicant => "applicant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "approver" => Some(Self::Approver),
            "applicant" => Some(Self::Applicant),
            _ => None,
        }
    }

    /// Returns whether this role grants `permission`.
    pub fn allows(self, permission: Permission) -> bool {
        match permission {
            Permission::Apply | Permission::Export | Permission::Query => true,
            Permission::Packaging | Permission::Review => {
                matches!(self, Self::Admin | Self::Approver)
            }
            Permission::Settings | Permission::Users => self == Self::Admin,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature-level permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Submit material applications.
    Apply,
    /// Edit packaging templates.
    Packaging,
    /// Approve, reject or return applications.
    Review,
    /// Export application data.
    Export,
    /// Search applications.
    Query,
    /// Change system settings.
    Settings,
    /// Manage user accounts.
    Users,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "APPLY",
            Self::Packaging => "PACKAGING",
            Self::Review => "REVIEW",
            Self::Export => "EXPORT",
            Self::Query => "QUERY",
            Self::Settings => "SETTINGS",
            Self::Users => "USERS",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub last_login: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserProfile {
    /// Creates an active profile with a generated id. Timestamps are filled
    /// in by storage.
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: None,
            role,
            department: None,
            position: None,
            phone: None,
            is_active: true,
            last_login: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Normalizes text fields and checks username/email shape.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.username = require_text("username", &self.username)?;
        self.email = optional_text(self.email.as_deref());
        if let Some(email) = self.email.as_deref() {
            validate_email(email)?;
        }
        self.department = optional_text(self.department.as_deref());
        self.position = optional_text(self.position.as_deref());
        self.phone = optional_text(self.phone.as_deref());
        Ok(())
    }

    /// Builds the acting identity for service calls.
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Checks that `email` has a `local@domain.tld` shape.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

/// Identity performing a service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn can(&self, permission: Permission) -> bool {
        self.role.allows(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_email, Permission, Role, UserProfile};
    use crate::model::ValidationError;

    #[test]
    fn permission_matrix_matches_roles() {
        for permission in [Permission::Apply, Permission::Export, Permission::Query] {
            assert!(Role::Applicant.allows(permission));
            assert!(Role::Approver.allows(permission));
            assert!(Role::Admin.allows(permission));
        }
        for permission in [Permission::Packaging, Permission::Review] {
            assert!(!Role::Applicant.allows(permission));
            assert!(Role::Approver.allows(permission));
            assert!(Role::Admin.allows(permission));
        }
        for permission in [Permission::Settings, Permission::Users] {
            assert!(!Role::Applicant.allows(permission));
            assert!(!Role::Approver.allows(permission));
            assert!(Role::Admin.allows(permission));
        }
    }

    #[test]
    fn role_parse_is_exact() {
        assert_eq!(Role::parse("approver"), Some(Role::Approver));
        assert_eq!(Role::parse("Approver"), None);
    }

    #[test]
    fn validate_normalizes_fields() {
        let mut user = UserProfile::new("  alice ", Role::Applicant);
        user.email = Some(" ".to_string());
        user.validate().expect("valid profile");
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, None);

        user.email = Some("alice-at-example".to_string());
        assert!(matches!(
            user.validate(),
            Err(ValidationError::InvalidEmail(_))
        ));
        assert!(validate_email("alice@example.com").is_ok());
    }
}
