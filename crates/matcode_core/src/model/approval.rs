//! Approval audit trail entries.

use crate::model::application::ApplicationId;
use crate::model::user::{Role, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    Submit,
    Approve,
    Reject,
    /// Sent back to the applicant for revision.
    Return,
}

impl ApprovalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "SUBMIT",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Return => "RETURN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUBMIT" => Some(Self::Submit),
            "APPROVE" => Some(Self::Approve),
            "REJECT" => Some(Self::Reject),
            "RETURN" => Some(Self::Return),
            _ => None,
        }
    }
}

/// Append-only audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLog {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub action: ApprovalAction,
    pub approver_id: UserId,
    /// Username snapshot at action time.
    pub approver_name: String,
    pub approver_role: Role,
    /// Review level the action applies to; `0` for submit.
    pub level: u32,
    pub reason: Option<String>,
    pub comment: Option<String>,
    pub created_at: i64,
}
