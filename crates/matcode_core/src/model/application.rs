//! Material-code application record.
//!
//! # Responsibility
//! - Define the stored application shape and its status enums.
//! - Define the submit-time draft and its validation.
//!
//! # Invariants
//! - `item_code` is unique and generated by the core; drafts never carry one.
//! - `status == Rejected` implies a non-blank `reject_reason`.
//! - Dimensions are finite and non-negative when present.

use crate::model::item_code::{validate_main_code, validate_spec_code, validate_sub_code, ItemCode};
use crate::model::packaging::PackagingSpec;
use crate::model::supplier::SupplierId;
use crate::model::user::UserId;
use crate::model::{optional_text, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ApplicationId = Uuid;

/// Workflow status visible to applicants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl Display for ApplicationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer-side status, finer grained than [`ApplicationStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    /// At least one review level approved, more levels remain.
    InReview,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InReview => "IN_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "IN_REVIEW" => Some(Self::InReview),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Outline dimensions. Lengths in millimetres, weight in grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Dimensions {
    pub fn is_empty(&self) -> bool {
        self.length.is_none() && self.width.is_none() && self.height.is_none() && self.weight.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("length", self.length),
            ("width", self.width),
            ("height", self.height),
            ("weight", self.weight),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ValidationError::InvalidDimension(field));
                }
            }
        }
        Ok(())
    }
}

/// Applicant input for a new application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationDraft {
    pub main_category: String,
    pub sub_category: String,
    pub spec_category: String,
    pub item_name_cn: String,
    pub item_name_en: Option<String>,
    pub material: Option<String>,
    pub surface_finish: Option<String>,
    pub dimensions: Dimensions,
    pub moq: Option<i64>,
    pub unit: Option<String>,
    pub customer_ref: Option<String>,
    pub customer_name: Option<String>,
    /// Supplier business code.
    pub supplier_code: Option<String>,
    pub notes: Option<String>,
    pub priority: Priority,
    pub packaging: PackagingSpec,
}

impl ApplicationDraft {
    /// Normalizes text fields and checks shape-level rules.
    ///
    /// Category existence and packaging option existence are checked by the
    /// services against the catalog.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.main_category = self.main_category.trim().to_string();
        self.sub_category = self.sub_category.trim().to_string();
        self.spec_category = self.spec_category.trim().to_string();
        validate_main_code(&self.main_category)?;
        validate_sub_code(&self.sub_category)?;
        validate_spec_code(&self.spec_category)?;

        self.item_name_cn = require_text("item_name_cn", &self.item_name_cn)?;
        self.item_name_en = optional_text(self.item_name_en.as_deref());
        self.material = optional_text(self.material.as_deref());
        self.surface_finish = optional_text(self.surface_finish.as_deref());
        self.unit = optional_text(self.unit.as_deref());
        self.customer_ref = optional_text(self.customer_ref.as_deref());
        self.customer_name = optional_text(self.customer_name.as_deref());
        self.supplier_code =
            optional_text(self.supplier_code.as_deref()).map(|code| code.to_ascii_uppercase());
        self.notes = optional_text(self.notes.as_deref());

        self.dimensions.validate()?;
        if let Some(moq) = self.moq {
            if moq <= 0 {
                return Err(ValidationError::NonPositiveQuantity("moq"));
            }
        }

        self.packaging = self
            .packaging
            .iter()
            .map(|(section, selection)| (*section, selection.normalized()))
            .filter(|(_, selection)| !selection.is_empty())
            .collect();
        Ok(())
    }
}

/// Stored application with resolved category codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub item_code: ItemCode,
    pub main_category: String,
    pub sub_category: String,
    pub spec_category: String,
    pub item_name_cn: String,
    pub item_name_en: Option<String>,
    pub material: Option<String>,
    pub surface_finish: Option<String>,
    pub dimensions: Dimensions,
    pub moq: Option<i64>,
    pub unit: Option<String>,
    pub customer_ref: Option<String>,
    pub customer_name: Option<String>,
    pub supplier_id: Option<SupplierId>,
    pub supplier_code: Option<String>,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    pub applicant_id: UserId,
    /// Resolved from `user_profiles`; `Unknown` when the profile is gone.
    pub applicant_name: String,
    pub status: ApplicationStatus,
    pub approval_status: ApprovalStatus,
    /// Number of review levels already passed.
    pub approval_level: u32,
    pub priority: Priority,
    pub approver_id: Option<UserId>,
    pub approval_date: Option<i64>,
    pub reject_date: Option<i64>,
    pub reject_reason: Option<String>,
    /// Bumped on every update.
    pub version: i64,
    pub submit_date: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub packaging: PackagingSpec,
}

impl Application {
    /// Checks invariants on a stored record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("item_name_cn", &self.item_name_cn)?;
        self.dimensions.validate()?;
        if let Some(moq) = self.moq {
            if moq <= 0 {
                return Err(ValidationError::NonPositiveQuantity("moq"));
            }
        }
        if self.status == ApplicationStatus::Rejected
            && self
                .reject_reason
                .as_deref()
                .map_or(true, |reason| reason.trim().is_empty())
        {
            return Err(ValidationError::MissingRejectReason);
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }
}

/// Editable fields of a pending application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationUpdate {
    pub item_name_cn: Option<String>,
    pub item_name_en: Option<String>,
    pub material: Option<String>,
    pub surface_finish: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub moq: Option<i64>,
    pub unit: Option<String>,
    pub customer_ref: Option<String>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    pub priority: Option<Priority>,
    pub packaging: Option<PackagingSpec>,
}

impl ApplicationUpdate {
    /// Applies present fields onto `application`. Blank optional text clears
    /// the field.
    pub fn apply_to(&self, application: &mut Application) -> Result<(), ValidationError> {
        if let Some(name) = self.item_name_cn.as_deref() {
            application.item_name_cn = require_text("item_name_cn", name)?;
        }
        let assign = |target: &mut Option<String>, value: &Option<String>| {
            if value.is_some() {
                *target = optional_text(value.as_deref());
            }
        };
        assign(&mut application.item_name_en, &self.item_name_en);
        assign(&mut application.material, &self.material);
        assign(&mut application.surface_finish, &self.surface_finish);
        assign(&mut application.unit, &self.unit);
        assign(&mut application.customer_ref, &self.customer_ref);
        assign(&mut application.customer_name, &self.customer_name);
        assign(&mut application.notes, &self.notes);
        assign(&mut application.internal_notes, &self.internal_notes);
        if let Some(dimensions) = self.dimensions {
            application.dimensions = dimensions;
        }
        if let Some(moq) = self.moq {
            application.moq = Some(moq);
        }
        if let Some(priority) = self.priority {
            application.priority = priority;
        }
        if let Some(packaging) = self.packaging.as_ref() {
            application.packaging = packaging
                .iter()
                .map(|(section, selection)| (*section, selection.normalized()))
                .filter(|(_, selection)| !selection.is_empty())
                .collect();
        }
        application.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplicationDraft, ApplicationStatus, ApprovalStatus, Dimensions, Priority};
    use crate::model::packaging::{PackagingSection, PackagingSelection};
    use crate::model::ValidationError;

    fn draft() -> ApplicationDraft {
        ApplicationDraft {
            main_category: "H".to_string(),
            sub_category: "01".to_string(),
            spec_category: "C".to_string(),
            item_name_cn: "鍍鉻旋鈕".to_string(),
            ..ApplicationDraft::default()
        }
    }

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Approved,
            ApplicationStatus::Rejected,
        ] {
            assert_eq!(ApplicationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(
            ApprovalStatus::parse("IN_REVIEW"),
            Some(ApprovalStatus::InReview)
        );
        assert_eq!(Priority::parse("LOW"), Some(Priority::Low));
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn draft_validation_normalizes_text_and_drops_empty_packaging() {
        let mut draft = draft();
        draft.main_category = " H ".to_string();
        draft.supplier_code = Some(" sup001 ".to_string());
        draft.material = Some("   ".to_string());
        draft
            .packaging
            .insert(PackagingSection::Transport, PackagingSelection::default());
        draft.packaging.insert(
            PackagingSection::InnerBox,
            PackagingSelection::with_options(["barcode"]),
        );

        draft.validate().expect("valid draft");
        assert_eq!(draft.main_category, "H");
        assert_eq!(draft.supplier_code.as_deref(), Some("SUP001"));
        assert_eq!(draft.material, None);
        assert_eq!(draft.packaging.len(), 1);
        assert!(draft.packaging.contains_key(&PackagingSection::InnerBox));
    }

    #[test]
    fn draft_validation_rejects_bad_input() {
        let mut missing_name = draft();
        missing_name.item_name_cn = "  ".to_string();
        assert_eq!(
            missing_name.validate().unwrap_err(),
            ValidationError::BlankField("item_name_cn")
        );

        let mut bad_sub = draft();
        bad_sub.sub_category = "1".to_string();
        assert!(matches!(
            bad_sub.validate(),
            Err(ValidationError::InvalidCode {
                field: "sub_category",
                ..
            })
        ));

        let mut bad_moq = draft();
        bad_moq.moq = Some(0);
        assert_eq!(
            bad_moq.validate().unwrap_err(),
            ValidationError::NonPositiveQuantity("moq")
        );

        let mut bad_dimension = draft();
        bad_dimension.dimensions = Dimensions {
            weight: Some(-1.0),
            ..Dimensions::default()
        };
        assert_eq!(
            bad_dimension.validate().unwrap_err(),
            ValidationError::InvalidDimension("weight")
        );
    }
}
