//! Application repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist applications with their packaging selections.
//! - Serve filtered application lists and status counts.
//! - Append and read the approval audit trail.
//!
//! # Invariants
//! - Item codes are unique; duplicates surface as `Conflict`.
//! - Writes bump `version` and only apply when the caller's `version` matches.
//! - Packaging replacement is atomic: it runs inside a savepoint, so it nests
//!   inside a caller transaction and is self-contained without one.
//! - Lists are ordered by `submit_date DESC`.

use crate::model::application::{
    Application, ApplicationId, ApplicationStatus, ApprovalStatus, Dimensions, Priority,
};
use crate::model::approval::{ApprovalAction, ApprovalLog};
use crate::model::category::CategoryLevel;
use crate::model::item_code::ItemCode;
use crate::model::packaging::{PackagingSelection, PackagingSpec};
use crate::model::user::{Role, UserId};
use crate::repo::packaging_repo::parse_section;
use crate::repo::{
    ensure_connection_ready, like_contains, map_unique_violation, parse_optional_uuid,
    parse_uuid, push_pagination, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const APPLICATION_SELECT_SQL: &str = "SELECT
    a.id,
    a.item_code,
    mc.code AS main_code,
    sc.code AS sub_code,
    pc.code AS spec_code,
    a.item_name_cn,
    a.item_name_en,
    a.material,
    a.surface_finish,
    a.dimensions,
    a.moq,
    a.unit,
    a.customer_ref,
    a.customer_name,
    a.supplier_id,
    s.code AS supplier_code,
    a.notes,
    a.internal_notes,
    a.applicant_id,
    COALESCE(u.username, 'Unknown') AS applicant_name,
    a.status,
    a.approval_status,
    a.approval_level,
    a.priority,
    a.approver_id,
    a.approval_date,
    a.reject_date,
    a.reject_reason,
    a.version,
    a.submit_date,
    a.created_at,
    a.updated_at
FROM applications a
INNER JOIN product_categories mc ON mc.id = a.main_category_id
INNER JOIN product_categories sc ON sc.id = a.sub_category_id
INNER JOIN product_categories pc ON pc.id = a.spec_category_id
LEFT JOIN suppliers s ON s.id = a.supplier_id
LEFT JOIN user_profiles u ON u.id = a.applicant_id";

const PACKAGING_SAVEPOINT: &str = "application_packaging";

/// Query options for listing applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationListQuery {
    /// `None` lists every status.
    pub status: Option<ApplicationStatus>,
    /// Case-insensitive item code substring.
    pub item_code: Option<String>,
    /// Case-insensitive applicant username substring.
    pub applicant: Option<String>,
    pub applicant_id: Option<UserId>,
    /// Inclusive lower bound on `submit_date` (epoch ms).
    pub date_from: Option<i64>,
    /// Inclusive upper bound on `submit_date` (epoch ms).
    pub date_to: Option<i64>,
    pub main_category: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Number of applications per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.approved + self.rejected
    }
}

/// Review-state write for one application.
///
/// `approval_date` is stamped when `status` is `Approved`, `reject_date` when
/// it is `Rejected`; both are cleared otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUpdate {
    pub status: ApplicationStatus,
    pub approval_status: ApprovalStatus,
    pub approval_level: u32,
    pub approver_id: Option<UserId>,
    pub reject_reason: Option<String>,
    pub updated_by: UserId,
}

/// Repository interface for applications.
pub trait ApplicationRepository {
    /// Inserts one application. Packaging is written separately.
    fn create_application(&self, application: &Application) -> RepoResult<ApplicationId>;
    /// Writes editable content fields. Fails with `Conflict` when the stored
    /// version differs from `application.version`.
    fn update_application(&self, application: &Application, updated_by: UserId) -> RepoResult<()>;
    /// Writes review state, guarded by `expected_version`.
    fn update_review_state(
        &self,
        id: ApplicationId,
        expected_version: i64,
        update: &ReviewUpdate,
    ) -> RepoResult<()>;
    fn get_application(&self, id: ApplicationId) -> RepoResult<Option<Application>>;
    fn find_by_item_code(&self, item_code: &str) -> RepoResult<Option<Application>>;
    fn list_applications(&self, query: &ApplicationListQuery) -> RepoResult<Vec<Application>>;
    fn count_by_status(&self) -> RepoResult<StatusCounts>;
    fn delete_application(&self, id: ApplicationId) -> RepoResult<()>;
    /// Replaces all packaging selections. Unknown option codes are skipped.
    fn replace_packaging(&self, id: ApplicationId, packaging: &PackagingSpec) -> RepoResult<()>;
    fn load_packaging(&self, id: ApplicationId) -> RepoResult<PackagingSpec>;
    fn append_approval_log(&self, log: &ApprovalLog) -> RepoResult<()>;
    /// Lists the audit trail oldest first.
    fn list_approval_logs(&self, id: ApplicationId) -> RepoResult<Vec<ApprovalLog>>;
}

/// SQLite-backed application repository.
pub struct SqliteApplicationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteApplicationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                "applications",
                "application_packaging",
                "application_packaging_sections",
                "approval_logs",
                "product_categories",
            ],
        )?;
        Ok(Self::new(conn))
    }

    fn query_applications(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Application>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut applications = Vec::new();
        while let Some(row) = rows.next()? {
            let mut application = parse_application_row(row)?;
            application.packaging = load_packaging(self.conn, application.id)?;
            applications.push(application);
        }
        Ok(applications)
    }

    fn ensure_version(&self, id: ApplicationId, changed: usize) -> RepoResult<()> {
        if changed > 0 {
            return Ok(());
        }
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Err(RepoError::conflict("application version", id))
        } else {
            Err(RepoError::not_found("application", id))
        }
    }
}

impl ApplicationRepository for SqliteApplicationRepository<'_> {
    fn create_application(&self, application: &Application) -> RepoResult<ApplicationId> {
        application.validate()?;
        let (main_id, sub_id, spec_id) = resolve_category_ids(
            self.conn,
            &application.main_category,
            &application.sub_category,
            &application.spec_category,
        )?;

        self.conn
            .execute(
                "INSERT INTO applications (
                    id,
                    item_code,
                    main_category_id,
                    sub_category_id,
                    spec_category_id,
                    item_name_cn,
                    item_name_en,
                    material,
                    surface_finish,
                    dimensions,
                    moq,
                    unit,
                    customer_ref,
                    customer_name,
                    supplier_id,
                    notes,
                    internal_notes,
                    applicant_id,
                    status,
                    approval_status,
                    approval_level,
                    priority
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                    ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
                );",
                params![
                    application.id.to_string(),
                    application.item_code.to_string(),
                    main_id,
                    sub_id,
                    spec_id,
                    application.item_name_cn.as_str(),
                    application.item_name_en.as_deref(),
                    application.material.as_deref(),
                    application.surface_finish.as_deref(),
                    dimensions_to_db(&application.dimensions)?,
                    application.moq,
                    application.unit.as_deref(),
                    application.customer_ref.as_deref(),
                    application.customer_name.as_deref(),
                    application.supplier_id.map(|id| id.to_string()),
                    application.notes.as_deref(),
                    application.internal_notes.as_deref(),
                    application.applicant_id.to_string(),
                    application.status.as_str(),
                    application.approval_status.as_str(),
                    application.approval_level,
                    application.priority.as_str(),
                ],
            )
            .map_err(|err| map_unique_violation(err, "item code", &application.item_code))?;

        Ok(application.id)
    }

    fn update_application(
        &self,
        application: &Application,
        updated_by: UserId,
    ) -> RepoResult<()> {
        application.validate()?;

        let changed = self.conn.execute(
            "UPDATE applications
             SET
                item_name_cn = ?2,
                item_name_en = ?3,
                material = ?4,
                surface_finish = ?5,
                dimensions = ?6,
                moq = ?7,
                unit = ?8,
                customer_ref = ?9,
                customer_name = ?10,
                supplier_id = ?11,
                notes = ?12,
                internal_notes = ?13,
                priority = ?14,
                updated_by_id = ?15,
                version = version + 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND version = ?16;",
            params![
                application.id.to_string(),
                application.item_name_cn.as_str(),
                application.item_name_en.as_deref(),
                application.material.as_deref(),
                application.surface_finish.as_deref(),
                dimensions_to_db(&application.dimensions)?,
                application.moq,
                application.unit.as_deref(),
                application.customer_ref.as_deref(),
                application.customer_name.as_deref(),
                application.supplier_id.map(|id| id.to_string()),
                application.notes.as_deref(),
                application.internal_notes.as_deref(),
                application.priority.as_str(),
                updated_by.to_string(),
                application.version,
            ],
        )?;

        self.ensure_version(application.id, changed)
    }

    fn update_review_state(
        &self,
        id: ApplicationId,
        expected_version: i64,
        update: &ReviewUpdate,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE applications
             SET
                status = ?2,
                approval_status = ?3,
                approval_level = ?4,
                approver_id = ?5,
                approval_date = CASE WHEN ?2 = 'APPROVED'
                    THEN (strftime('%s', 'now') * 1000) ELSE NULL END,
                reject_date = CASE WHEN ?2 = 'REJECTED'
                    THEN (strftime('%s', 'now') * 1000) ELSE NULL END,
                reject_reason = ?6,
                updated_by_id = ?7,
                version = version + 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND version = ?8;",
            params![
                id.to_string(),
                update.status.as_str(),
                update.approval_status.as_str(),
                update.approval_level,
                update.approver_id.map(|value| value.to_string()),
                update.reject_reason.as_deref(),
                update.updated_by.to_string(),
                expected_version,
            ],
        )?;

        self.ensure_version(id, changed)
    }

    fn get_application(&self, id: ApplicationId) -> RepoResult<Option<Application>> {
        let sql = format!("{APPLICATION_SELECT_SQL} WHERE a.id = ?;");
        Ok(self
            .query_applications(&sql, vec![Value::Text(id.to_string())])?
            .into_iter()
            .next())
    }

    fn find_by_item_code(&self, item_code: &str) -> RepoResult<Option<Application>> {
        let sql = format!("{APPLICATION_SELECT_SQL} WHERE a.item_code = ?;");
        Ok(self
            .query_applications(&sql, vec![Value::Text(item_code.trim().to_string())])?
            .into_iter()
            .next())
    }

    fn list_applications(&self, query: &ApplicationListQuery) -> RepoResult<Vec<Application>> {
        let mut sql = format!("{APPLICATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND a.status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(item_code) = non_blank(query.item_code.as_deref()) {
            sql.push_str(" AND a.item_code LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(like_contains(item_code)));
        }
        if let Some(applicant) = non_blank(query.applicant.as_deref()) {
            sql.push_str(" AND u.username LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(like_contains(applicant)));
        }
        if let Some(applicant_id) = query.applicant_id {
            sql.push_str(" AND a.applicant_id = ?");
            bind_values.push(Value::Text(applicant_id.to_string()));
        }
        if let Some(from) = query.date_from {
            sql.push_str(" AND a.submit_date >= ?");
            bind_values.push(Value::Integer(from));
        }
        if let Some(to) = query.date_to {
            sql.push_str(" AND a.submit_date <= ?");
            bind_values.push(Value::Integer(to));
        }
        if let Some(main) = non_blank(query.main_category.as_deref()) {
            sql.push_str(" AND mc.code = ?");
            bind_values.push(Value::Text(main.to_string()));
        }

        sql.push_str(" ORDER BY a.submit_date DESC, a.rowid DESC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        self.query_applications(&sql, bind_values)
    }

    fn count_by_status(&self) -> RepoResult<StatusCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM applications GROUP BY status;")?;
        let mut rows = stmt.query([])?;
        let mut counts = StatusCounts::default();
        while let Some(row) = rows.next()? {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let count = u64::try_from(count).unwrap_or_default();
            match ApplicationStatus::parse(&status) {
                Some(ApplicationStatus::Pending) => counts.pending = count,
                Some(ApplicationStatus::Approved) => counts.approved = count,
                Some(ApplicationStatus::Rejected) => counts.rejected = count,
                None => {
                    return Err(RepoError::InvalidData(format!(
                        "invalid status `{status}` in applications.status"
                    )));
                }
            }
        }
        Ok(counts)
    }

    fn delete_application(&self, id: ApplicationId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM applications WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("application", id));
        }
        Ok(())
    }

    fn replace_packaging(&self, id: ApplicationId, packaging: &PackagingSpec) -> RepoResult<()> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {PACKAGING_SAVEPOINT};"))?;
        match write_packaging(self.conn, id, packaging) {
            Ok(()) => {
                self.conn
                    .execute_batch(&format!("RELEASE {PACKAGING_SAVEPOINT};"))?;
                Ok(())
            }
            Err(err) => {
                self.conn.execute_batch(&format!(
                    "ROLLBACK TO {PACKAGING_SAVEPOINT}; RELEASE {PACKAGING_SAVEPOINT};"
                ))?;
                Err(err)
            }
        }
    }

    fn load_packaging(&self, id: ApplicationId) -> RepoResult<PackagingSpec> {
        load_packaging(self.conn, id)
    }

    fn append_approval_log(&self, log: &ApprovalLog) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO approval_logs (
                id,
                application_id,
                action,
                approver_id,
                approver_name,
                approver_role,
                level,
                reason,
                comment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                log.id.to_string(),
                log.application_id.to_string(),
                log.action.as_str(),
                log.approver_id.to_string(),
                log.approver_name.as_str(),
                log.approver_role.as_str(),
                log.level,
                log.reason.as_deref(),
                log.comment.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn list_approval_logs(&self, id: ApplicationId) -> RepoResult<Vec<ApprovalLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                application_id,
                action,
                approver_id,
                approver_name,
                approver_role,
                level,
                reason,
                comment,
                created_at
             FROM approval_logs
             WHERE application_id = ?1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(parse_approval_log_row(row)?);
        }
        Ok(logs)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn resolve_category_ids(
    conn: &Connection,
    main: &str,
    sub: &str,
    spec: &str,
) -> RepoResult<(i64, i64, i64)> {
    let lookup = |level: CategoryLevel, code: &str| -> RepoResult<i64> {
        conn.query_row(
            "SELECT id
             FROM product_categories
             WHERE level = ?1
               AND main_category_code = ?2
               AND code = ?3;",
            params![level.as_i64(), main, code],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| RepoError::not_found("category", format!("{main}/{code}")))
    };

    Ok((
        lookup(CategoryLevel::Main, main)?,
        lookup(CategoryLevel::Sub, sub)?,
        lookup(CategoryLevel::Spec, spec)?,
    ))
}

fn write_packaging(conn: &Connection, id: ApplicationId, packaging: &PackagingSpec) -> RepoResult<()> {
    let id_text = id.to_string();
    conn.execute(
        "DELETE FROM application_packaging WHERE application_id = ?1;",
        [id_text.as_str()],
    )?;
    conn.execute(
        "DELETE FROM application_packaging_sections WHERE application_id = ?1;",
        [id_text.as_str()],
    )?;

    for (section, selection) in packaging {
        if selection.is_empty() {
            continue;
        }
        conn.execute(
            "INSERT INTO application_packaging_sections (
                application_id,
                packaging_category_id,
                description
             )
             SELECT ?1, id, ?3
             FROM packaging_categories
             WHERE code = ?2;",
            params![id_text.as_str(), section.as_str(), selection.description.as_deref()],
        )?;

        for (index, option) in selection.options.iter().enumerate() {
            conn.execute(
                "INSERT OR IGNORE INTO application_packaging (
                    application_id,
                    packaging_category_id,
                    packaging_option_id,
                    display_order
                 )
                 SELECT ?1, c.id, o.id, ?4
                 FROM packaging_options o
                 INNER JOIN packaging_categories c ON c.id = o.category_id
                 WHERE c.code = ?2
                   AND o.code = ?3;",
                params![id_text.as_str(), section.as_str(), option.as_str(), index as i64],
            )?;
        }
    }
    Ok(())
}

fn load_packaging(conn: &Connection, id: ApplicationId) -> RepoResult<PackagingSpec> {
    let id_text = id.to_string();
    let mut spec = PackagingSpec::new();

    let mut stmt = conn.prepare(
        "SELECT c.code AS section_code, s.description
         FROM application_packaging_sections s
         INNER JOIN packaging_categories c ON c.id = s.packaging_category_id
         WHERE s.application_id = ?1;",
    )?;
    let mut rows = stmt.query([id_text.as_str()])?;
    while let Some(row) = rows.next()? {
        let section_code: String = row.get("section_code")?;
        let section = parse_section(&section_code, "packaging_categories.code")?;
        spec.insert(
            section,
            PackagingSelection {
                options: Vec::new(),
                description: row.get("description")?,
            },
        );
    }

    let mut stmt = conn.prepare(
        "SELECT c.code AS section_code, o.code AS option_code
         FROM application_packaging ap
         INNER JOIN packaging_categories c ON c.id = ap.packaging_category_id
         INNER JOIN packaging_options o ON o.id = ap.packaging_option_id
         WHERE ap.application_id = ?1
         ORDER BY c.display_order ASC, ap.display_order ASC;",
    )?;
    let mut rows = stmt.query([id_text.as_str()])?;
    while let Some(row) = rows.next()? {
        let section_code: String = row.get("section_code")?;
        let section = parse_section(&section_code, "packaging_categories.code")?;
        spec.entry(section)
            .or_default()
            .options
            .push(row.get("option_code")?);
    }

    spec.retain(|_, selection| !selection.is_empty());
    Ok(spec)
}

fn dimensions_to_db(dimensions: &Dimensions) -> RepoResult<Option<String>> {
    if dimensions.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(dimensions)
        .map(Some)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode dimensions: {err}")))
}

fn parse_dimensions(value: Option<String>) -> RepoResult<Dimensions> {
    match value {
        Some(text) if !text.trim().is_empty() => serde_json::from_str(&text).map_err(|err| {
            RepoError::InvalidData(format!("invalid json in applications.dimensions: {err}"))
        }),
        _ => Ok(Dimensions::default()),
    }
}

fn parse_application_row(row: &Row<'_>) -> RepoResult<Application> {
    let id_text: String = row.get("id")?;
    let item_code_text: String = row.get("item_code")?;
    let item_code: ItemCode = item_code_text.parse().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid item code `{item_code_text}` in applications.item_code"
        ))
    })?;
    let applicant_text: String = row.get("applicant_id")?;

    let status_text: String = row.get("status")?;
    let status = ApplicationStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in applications.status"))
    })?;
    let approval_text: String = row.get("approval_status")?;
    let approval_status = ApprovalStatus::parse(&approval_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid approval status `{approval_text}` in applications.approval_status"
        ))
    })?;
    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in applications.priority"
        ))
    })?;
    let approval_level: i64 = row.get("approval_level")?;
    let approval_level = u32::try_from(approval_level).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid approval level `{approval_level}` in applications.approval_level"
        ))
    })?;

    let application = Application {
        id: parse_uuid(&id_text, "applications.id")?,
        item_code,
        main_category: row.get("main_code")?,
        sub_category: row.get("sub_code")?,
        spec_category: row.get("spec_code")?,
        item_name_cn: row.get("item_name_cn")?,
        item_name_en: row.get("item_name_en")?,
        material: row.get("material")?,
        surface_finish: row.get("surface_finish")?,
        dimensions: parse_dimensions(row.get("dimensions")?)?,
        moq: row.get("moq")?,
        unit: row.get("unit")?,
        customer_ref: row.get("customer_ref")?,
        customer_name: row.get("customer_name")?,
        supplier_id: parse_optional_uuid(row.get("supplier_id")?, "applications.supplier_id")?,
        supplier_code: row.get("supplier_code")?,
        notes: row.get("notes")?,
        internal_notes: row.get("internal_notes")?,
        applicant_id: parse_uuid(&applicant_text, "applications.applicant_id")?,
        applicant_name: row.get("applicant_name")?,
        status,
        approval_status,
        approval_level,
        priority,
        approver_id: parse_optional_uuid(row.get("approver_id")?, "applications.approver_id")?,
        approval_date: row.get("approval_date")?,
        reject_date: row.get("reject_date")?,
        reject_reason: row.get("reject_reason")?,
        version: row.get("version")?,
        submit_date: row.get("submit_date")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        packaging: PackagingSpec::new(),
    };
    application.validate()?;
    Ok(application)
}

fn parse_approval_log_row(row: &Row<'_>) -> RepoResult<ApprovalLog> {
    let id_text: String = row.get("id")?;
    let application_text: String = row.get("application_id")?;
    let action_text: String = row.get("action")?;
    let action = ApprovalAction::parse(&action_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid action `{action_text}` in approval_logs.action"))
    })?;
    let approver_id = parse_optional_uuid(row.get("approver_id")?, "approval_logs.approver_id")?
        .ok_or_else(|| RepoError::InvalidData("missing approval_logs.approver_id".to_string()))?;
    let role_text: Option<String> = row.get("approver_role")?;
    let approver_role = role_text.as_deref().and_then(Role::parse).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid role `{}` in approval_logs.approver_role",
            role_text.as_deref().unwrap_or_default()
        ))
    })?;
    let level: i64 = row.get("level")?;

    Ok(ApprovalLog {
        id: parse_uuid(&id_text, "approval_logs.id")?,
        application_id: parse_uuid(&application_text, "approval_logs.application_id")?,
        action,
        approver_id,
        approver_name: row
            .get::<_, Option<String>>("approver_name")?
            .unwrap_or_default(),
        approver_role,
        level: u32::try_from(level).map_err(|_| {
            RepoError::InvalidData(format!("invalid level `{level}` in approval_logs.level"))
        })?,
        reason: row.get("reason")?,
        comment: row.get("comment")?,
        created_at: row.get("created_at")?,
    })
}
