//! Core domain logic for the material-code application workflow.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::application::{
    Application, ApplicationDraft, ApplicationId, ApplicationStatus, ApplicationUpdate,
    ApprovalStatus, Dimensions, Priority,
};
pub use model::item_code::{CounterKey, ItemCode};
pub use model::settings::SystemSettings;
pub use model::user::{Actor, Permission, Role, UserId, UserProfile};
pub use model::ValidationError;
pub use repo::{RepoError, RepoResult};
pub use service::application_service::ApplicationService;
pub use service::code_service::CodeService;
pub use service::export_service::{ExportOutput, ExportRequest, ExportService};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
