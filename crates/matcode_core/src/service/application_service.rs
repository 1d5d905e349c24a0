//! Application submission and review workflow.
//!
//! # Responsibility
//! - Submit applications: validate, allocate the item code and persist the
//!   record, its packaging and the SUBMIT audit entry.
//! - Drive review transitions (approve, reject, return) with audit entries.
//! - Serve search, detail, edit and delete use-cases under role rules.
//!
//! # Invariants
//! - Submission is one IMMEDIATE transaction: counter increment, application
//!   row, packaging rows and audit rows commit or roll back together.
//! - Only `PENDING` applications can be reviewed, edited by their applicant,
//!   or deleted by their applicant.
//! - An application with attachments is only deleted together with them.
//! - An application reaches `APPROVED` after `approval_level` approvals;
//!   intermediate approvals leave it `PENDING` with `IN_REVIEW` review state.

use crate::model::application::{
    Application, ApplicationDraft, ApplicationId, ApplicationStatus, ApplicationUpdate,
    ApprovalStatus,
};
use crate::model::approval::{ApprovalAction, ApprovalLog};
use crate::model::attachment::Attachment;
use crate::model::item_code::CounterKey;
use crate::model::user::{Actor, Permission, Role};
use crate::model::{optional_text, ValidationError};
use crate::repo::application_repo::{
    ApplicationListQuery, ApplicationRepository, ReviewUpdate, SqliteApplicationRepository,
    StatusCounts,
};
use crate::repo::attachment_repo::{AttachmentRepository, SqliteAttachmentRepository};
use crate::repo::category_repo::SqliteCategoryRepository;
use crate::repo::packaging_repo::SqlitePackagingRepository;
use crate::repo::settings_repo::SqliteSettingsRepository;
use crate::repo::supplier_repo::{SqliteSupplierRepository, SupplierRepository};
use crate::service::category_service::CategoryService;
use crate::service::code_service::allocate_item_code;
use crate::service::packaging_service::PackagingService;
use crate::service::settings_service::load_settings;
use crate::service::{require_permission, ServiceError, ServiceResult};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

const AUTO_APPROVE_COMMENT: &str = "auto-approved on submit";

/// Application workflow service bound to one connection.
pub struct ApplicationService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ApplicationService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Submits a new application and returns the stored record.
    pub fn submit(&self, actor: &Actor, mut draft: ApplicationDraft) -> ServiceResult<Application> {
        require_permission(actor, Permission::Apply)?;
        draft.validate()?;
        SqliteApplicationRepository::try_new(self.conn)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let selection = CategoryService::new(SqliteCategoryRepository::new(&tx))
            .validate_selection(&draft.main_category, &draft.sub_category, &draft.spec_category)?;
        PackagingService::new(SqlitePackagingRepository::new(&tx)).validate_spec(&draft.packaging)?;

        let supplier_id = match draft.supplier_code.as_deref() {
            Some(code) => {
                let supplier = SqliteSupplierRepository::new(&tx)
                    .find_supplier_by_code(code)?
                    .filter(|supplier| supplier.is_active)
                    .ok_or_else(|| ServiceError::NotFound {
                        entity: "supplier",
                        key: code.to_string(),
                    })?;
                Some(supplier.id)
            }
            None => None,
        };

        let settings = load_settings(&SqliteSettingsRepository::new(&tx))?;
        let key = CounterKey::new(
            &selection.main.code,
            &selection.sub.code,
            &selection.spec.code,
        )?;
        let item_code = allocate_item_code(&tx, &key, Some(actor.user_id), &settings)?;

        let application = Application {
            id: Uuid::new_v4(),
            item_code,
            main_category: selection.main.code,
            sub_category: selection.sub.code,
            spec_category: selection.spec.code,
            item_name_cn: draft.item_name_cn,
            item_name_en: draft.item_name_en,
            material: draft.material,
            surface_finish: draft.surface_finish,
            dimensions: draft.dimensions,
            moq: draft.moq,
            unit: draft.unit,
            customer_ref: draft.customer_ref,
            customer_name: draft.customer_name,
            supplier_id,
            supplier_code: draft.supplier_code,
            notes: draft.notes,
            internal_notes: None,
            applicant_id: actor.user_id,
            applicant_name: actor.username.clone(),
            status: ApplicationStatus::Pending,
            approval_status: ApprovalStatus::Pending,
            approval_level: 0,
            priority: draft.priority,
            approver_id: None,
            approval_date: None,
            reject_date: None,
            reject_reason: None,
            version: 1,
            submit_date: 0,
            created_at: 0,
            updated_at: 0,
            packaging: draft.packaging,
        };

        let repo = SqliteApplicationRepository::new(&tx);
        repo.create_application(&application)?;
        repo.replace_packaging(application.id, &application.packaging)?;
        repo.append_approval_log(&audit_entry(
            actor,
            application.id,
            ApprovalAction::Submit,
            0,
            None,
            None,
        ))?;

        if settings.auto_approve {
            repo.update_review_state(
                application.id,
                application.version,
                &ReviewUpdate {
                    status: ApplicationStatus::Approved,
                    approval_status: ApprovalStatus::Approved,
                    approval_level: settings.approval_level,
                    approver_id: Some(actor.user_id),
                    reject_reason: None,
                    updated_by: actor.user_id,
                },
            )?;
            repo.append_approval_log(&audit_entry(
                actor,
                application.id,
                ApprovalAction::Approve,
                settings.approval_level,
                None,
                Some(AUTO_APPROVE_COMMENT.to_string()),
            ))?;
        }

        tx.commit()?;
        info!(
            "event=application_submit module=service status=ok id={} item_code={} auto_approve={}",
            application.id, application.item_code, settings.auto_approve
        );

        self.load(application.id)
    }

    pub fn get(&self, actor: &Actor, id: ApplicationId) -> ServiceResult<Application> {
        require_permission(actor, Permission::Query)?;
        self.load(id)
    }

    pub fn find_by_item_code(&self, actor: &Actor, item_code: &str) -> ServiceResult<Application> {
        require_permission(actor, Permission::Query)?;
        SqliteApplicationRepository::try_new(self.conn)?
            .find_by_item_code(item_code)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "application",
                key: item_code.trim().to_string(),
            })
    }

    pub fn search(
        &self,
        actor: &Actor,
        query: &ApplicationListQuery,
    ) -> ServiceResult<Vec<Application>> {
        require_permission(actor, Permission::Query)?;
        Ok(SqliteApplicationRepository::try_new(self.conn)?.list_applications(query)?)
    }

    pub fn counts(&self, actor: &Actor) -> ServiceResult<StatusCounts> {
        require_permission(actor, Permission::Query)?;
        Ok(SqliteApplicationRepository::try_new(self.conn)?.count_by_status()?)
    }

    pub fn pending_count(&self, actor: &Actor) -> ServiceResult<u64> {
        Ok(self.counts(actor)?.pending)
    }

    /// Audit trail, oldest first.
    pub fn history(&self, actor: &Actor, id: ApplicationId) -> ServiceResult<Vec<ApprovalLog>> {
        require_permission(actor, Permission::Query)?;
        let repo = SqliteApplicationRepository::try_new(self.conn)?;
        if repo.get_application(id)?.is_none() {
            return Err(not_found(id));
        }
        Ok(repo.list_approval_logs(id)?)
    }

    /// Edits a pending application. Allowed for its applicant and admins.
    pub fn update(
        &self,
        actor: &Actor,
        id: ApplicationId,
        update: &ApplicationUpdate,
    ) -> ServiceResult<Application> {
        require_permission(actor, Permission::Apply)?;
        let mut application = self.load(id)?;
        ensure_owner_or_admin(actor, &application)?;
        ensure_pending(&application)?;
        update.apply_to(&mut application)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if update.packaging.is_some() {
            PackagingService::new(SqlitePackagingRepository::new(&tx))
                .validate_spec(&application.packaging)?;
        }
        let repo = SqliteApplicationRepository::new(&tx);
        repo.update_application(&application, actor.user_id)?;
        if update.packaging.is_some() {
            repo.replace_packaging(id, &application.packaging)?;
        }
        tx.commit()?;

        info!("event=application_update module=service status=ok id={id}");
        self.load(id)
    }

    /// Deletes an application. Admins may delete any; applicants only their
    /// own while pending.
    ///
    /// Fails with `Conflict` while attachments exist; use
    /// `AttachmentService::delete_application` to remove their blobs too.
    pub fn delete(&self, actor: &Actor, id: ApplicationId) -> ServiceResult<()> {
        self.delete_record(actor, id, false).map(|_| ())
    }

    /// Deletes the application row and returns the attachment metadata that
    /// went with it. Blob cleanup is left to the caller.
    pub(crate) fn delete_record(
        &self,
        actor: &Actor,
        id: ApplicationId,
        with_attachments: bool,
    ) -> ServiceResult<Vec<Attachment>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let repo = SqliteApplicationRepository::new(&tx);
        let application = repo.get_application(id)?.ok_or_else(|| not_found(id))?;
        if actor.role != Role::Admin {
            require_permission(actor, Permission::Apply)?;
            ensure_owner_or_admin(actor, &application)?;
            ensure_pending(&application)?;
        }

        let attachments = SqliteAttachmentRepository::new(&tx).list_attachments(id)?;
        if !attachments.is_empty() && !with_attachments {
            return Err(ServiceError::Conflict {
                entity: "application attachments",
                key: id.to_string(),
            });
        }
        repo.delete_application(id)?;
        tx.commit()?;

        info!(
            "event=application_delete module=service status=ok id={id} attachments={}",
            attachments.len()
        );
        Ok(attachments)
    }

    /// Records one approval. The application becomes `APPROVED` once the
    /// configured number of approvals is reached.
    pub fn approve(
        &self,
        actor: &Actor,
        id: ApplicationId,
        comment: Option<&str>,
    ) -> ServiceResult<Application> {
        require_permission(actor, Permission::Review)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let repo = SqliteApplicationRepository::new(&tx);
        let application = repo.get_application(id)?.ok_or_else(|| not_found(id))?;
        ensure_pending(&application)?;

        let settings = load_settings(&SqliteSettingsRepository::new(&tx))?;
        let level = application.approval_level + 1;
        let (status, approval_status) = if level < settings.approval_level {
            (ApplicationStatus::Pending, ApprovalStatus::InReview)
        } else {
            (ApplicationStatus::Approved, ApprovalStatus::Approved)
        };

        repo.update_review_state(
            id,
            application.version,
            &ReviewUpdate {
                status,
                approval_status,
                approval_level: level,
                approver_id: Some(actor.user_id),
                reject_reason: None,
                updated_by: actor.user_id,
            },
        )?;
        repo.append_approval_log(&audit_entry(
            actor,
            id,
            ApprovalAction::Approve,
            level,
            None,
            optional_text(comment),
        ))?;
        tx.commit()?;

        info!(
            "event=application_approve module=service status=ok id={id} level={level} required={}",
            settings.approval_level
        );
        self.load(id)
    }

    /// Rejects a pending application. `reason` must not be blank.
    pub fn reject(
        &self,
        actor: &Actor,
        id: ApplicationId,
        reason: &str,
        comment: Option<&str>,
    ) -> ServiceResult<Application> {
        require_permission(actor, Permission::Review)?;
        let reason = optional_text(Some(reason)).ok_or(ValidationError::MissingRejectReason)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let repo = SqliteApplicationRepository::new(&tx);
        let application = repo.get_application(id)?.ok_or_else(|| not_found(id))?;
        ensure_pending(&application)?;

        repo.update_review_state(
            id,
            application.version,
            &ReviewUpdate {
                status: ApplicationStatus::Rejected,
                approval_status: ApprovalStatus::Rejected,
                approval_level: application.approval_level,
                approver_id: Some(actor.user_id),
                reject_reason: Some(reason.clone()),
                updated_by: actor.user_id,
            },
        )?;
        repo.append_approval_log(&audit_entry(
            actor,
            id,
            ApprovalAction::Reject,
            application.approval_level + 1,
            Some(reason),
            optional_text(comment),
        ))?;
        tx.commit()?;

        info!("event=application_reject module=service status=ok id={id}");
        self.load(id)
    }

    /// Sends a pending application back to its applicant and clears review
    /// progress.
    pub fn return_for_revision(
        &self,
        actor: &Actor,
        id: ApplicationId,
        reason: Option<&str>,
        comment: Option<&str>,
    ) -> ServiceResult<Application> {
        require_permission(actor, Permission::Review)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let repo = SqliteApplicationRepository::new(&tx);
        let application = repo.get_application(id)?.ok_or_else(|| not_found(id))?;
        ensure_pending(&application)?;

        repo.update_review_state(
            id,
            application.version,
            &ReviewUpdate {
                status: ApplicationStatus::Pending,
                approval_status: ApprovalStatus::Pending,
                approval_level: 0,
                approver_id: None,
                reject_reason: None,
                updated_by: actor.user_id,
            },
        )?;
        repo.append_approval_log(&audit_entry(
            actor,
            id,
            ApprovalAction::Return,
            application.approval_level,
            optional_text(reason),
            optional_text(comment),
        ))?;
        tx.commit()?;

        info!("event=application_return module=service status=ok id={id}");
        self.load(id)
    }

    fn load(&self, id: ApplicationId) -> ServiceResult<Application> {
        SqliteApplicationRepository::try_new(self.conn)?
            .get_application(id)?
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: ApplicationId) -> ServiceError {
    ServiceError::NotFound {
        entity: "application",
        key: id.to_string(),
    }
}

fn ensure_pending(application: &Application) -> ServiceResult<()> {
    if application.is_pending() {
        return Ok(());
    }
    warn!(
        "event=application_state_check module=service status=error id={} current={}",
        application.id, application.status
    );
    Err(ServiceError::InvalidState {
        id: application.id,
        status: application.status,
    })
}

fn ensure_owner_or_admin(actor: &Actor, application: &Application) -> ServiceResult<()> {
    if actor.role == Role::Admin || application.applicant_id == actor.user_id {
        Ok(())
    } else {
        Err(ServiceError::NotOwner(application.id))
    }
}

fn audit_entry(
    actor: &Actor,
    application_id: ApplicationId,
    action: ApprovalAction,
    level: u32,
    reason: Option<String>,
    comment: Option<String>,
) -> ApprovalLog {
    ApprovalLog {
        id: Uuid::new_v4(),
        application_id,
        action,
        approver_id: actor.user_id,
        approver_name: actor.username.clone(),
        approver_role: actor.role,
        level,
        reason,
        comment,
        created_at: 0,
    }
}
