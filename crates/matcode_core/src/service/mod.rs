//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce role permissions before any write.
//! - Keep CLI/UI layers decoupled from storage details.
//!
//! # Invariants
//! - Every service error maps semantic repository errors (`NotFound`,
//!   `Conflict`, `Validation`) onto its own variants; transport errors stay
//!   wrapped in `Repo`.

use crate::model::application::{ApplicationId, ApplicationStatus};
use crate::model::item_code::CounterKey;
use crate::model::packaging::PackagingSection;
use crate::model::user::{Actor, Permission, Role};
use crate::model::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod application_service;
pub mod attachment_service;
pub mod category_service;
pub mod code_service;
pub mod export_service;
pub mod packaging_service;
pub mod settings_service;
pub mod supplier_service;
pub mod user_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error shared by all use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Actor role lacks the permission the operation needs.
    PermissionDenied { role: Role, permission: Permission },
    /// Actor has the permission but is not allowed to touch this record.
    NotOwner(ApplicationId),
    Validation(ValidationError),
    NotFound { entity: &'static str, key: String },
    Conflict { entity: &'static str, key: String },
    /// Category codes do not form a valid main/sub/spec selection.
    InvalidCategory {
        main: String,
        sub: String,
        spec: String,
    },
    /// Packaging option code is not in the active catalog.
    UnknownPackagingOption {
        section: PackagingSection,
        code: String,
    },
    /// Application is not in a state that allows the operation.
    InvalidState {
        id: ApplicationId,
        status: ApplicationStatus,
    },
    /// Counter key has no serial left for the configured digit count.
    CodeSpaceExhausted { key: CounterKey, digits: u32 },
    /// Requested export format is recorded but not rendered.
    UnsupportedExportFormat(&'static str),
    /// Blob storage failure.
    Storage(std::io::Error),
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied { role, permission } => {
                write!(f, "role `{role}` lacks permission {permission}")
            }
            Self::NotOwner(id) => write!(f, "application {id} belongs to another applicant"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Conflict { entity, key } => write!(f, "{entity} conflict: {key}"),
            Self::InvalidCategory { main, sub, spec } => {
                write!(f, "invalid category selection {main}/{sub}/{spec}")
            }
            Self::UnknownPackagingOption { section, code } => {
                write!(f, "unknown packaging option `{code}` in section {section}")
            }
            Self::InvalidState { id, status } => {
                write!(f, "application {id} is {status}, expected PENDING")
            }
            Self::CodeSpaceExhausted { key, digits } => {
                write!(f, "no serial left for {key} with {digits} digits")
            }
            Self::UnsupportedExportFormat(format) => {
                write!(f, "export format {format} is not rendered")
            }
            Self::Storage(err) => write!(f, "blob storage error: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Conflict { entity, key } => Self::Conflict { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value)
    }
}

/// Fails with `PermissionDenied` unless `actor` holds `permission`.
pub(crate) fn require_permission(actor: &Actor, permission: Permission) -> ServiceResult<()> {
    if actor.can(permission) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied {
            role: actor.role,
            permission,
        })
    }
}
