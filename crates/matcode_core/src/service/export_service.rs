//! Application export.
//!
//! # Responsibility
//! - Select applications by export filters and render them as CSV.
//! - Record every export in `export_logs`.
//!
//! # Invariants
//! - Rows are grouped by main category, then ordered by item code.
//! - Packaging sections render as `[a, b] | description`.
//! - Only CSV is rendered; other formats fail before anything is recorded.
//! - The export log is written after the content was delivered.

use crate::model::application::{Application, ApplicationStatus};
use crate::model::export_log::{ExportFormat, ExportLog};
use crate::model::packaging::PackagingSection;
use crate::model::user::{Actor, Permission};
use crate::repo::application_repo::{
    ApplicationListQuery, ApplicationRepository, SqliteApplicationRepository,
};
use crate::repo::export_log_repo::{
    ExportLogQuery, ExportLogRepository, SqliteExportLogRepository,
};
use crate::service::packaging_service::format_section;
use crate::service::{require_permission, ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::Connection;
use std::borrow::Cow;
use uuid::Uuid;

const FIXED_COLUMNS: [&str; 22] = [
    "Item Code",
    "Main Category",
    "Sub Category",
    "Spec Category",
    "Item Name (CN)",
    "Item Name (EN)",
    "Material",
    "Surface Finish",
    "Length",
    "Width",
    "Height",
    "Weight",
    "MOQ",
    "Unit",
    "Customer Ref",
    "Customer",
    "Supplier",
    "Applicant",
    "Status",
    "Submit Date",
    "Approval Date",
    "Notes",
];

/// Export filters and output options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub main_category: Option<String>,
    /// `None` exports every status.
    pub status: Option<ApplicationStatus>,
    /// Inclusive `submit_date` bounds (epoch ms).
    pub date_from: Option<i64>,
    pub date_to: Option<i64>,
    pub format: ExportFormat,
    /// Output file name; generated when absent.
    pub file_name: Option<String>,
    /// Where the caller stores the file, recorded on the log.
    pub file_path: Option<String>,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            main_category: None,
            status: Some(ApplicationStatus::Approved),
            date_from: None,
            date_to: None,
            format: ExportFormat::Csv,
            file_name: None,
            file_path: None,
        }
    }
}

/// Rendered export plus its log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub log: ExportLog,
    pub content: String,
}

/// Export service bound to one connection.
pub struct ExportService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ExportService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Renders the export and records it. The content is only returned; see
    /// [`ExportService::export_to`] when it must be persisted first.
    pub fn export(&self, actor: &Actor, request: &ExportRequest) -> ServiceResult<ExportOutput> {
        self.export_to(actor, request, |_| Ok(()))
    }

    /// Renders the export, hands the content to `write`, and records the log
    /// only after `write` succeeds. A failed write records nothing.
    pub fn export_to<W>(
        &self,
        actor: &Actor,
        request: &ExportRequest,
        write: W,
    ) -> ServiceResult<ExportOutput>
    where
        W: FnOnce(&str) -> std::io::Result<()>,
    {
        require_permission(actor, Permission::Export)?;
        if request.format != ExportFormat::Csv {
            return Err(ServiceError::UnsupportedExportFormat(request.format.as_str()));
        }

        let query = ApplicationListQuery {
            status: request.status,
            main_category: request.main_category.clone(),
            date_from: request.date_from,
            date_to: request.date_to,
            ..ApplicationListQuery::default()
        };
        let mut applications =
            SqliteApplicationRepository::try_new(self.conn)?.list_applications(&query)?;
        applications.sort_by(|left, right| {
            left.main_category
                .cmp(&right.main_category)
                .then_with(|| left.item_code.to_string().cmp(&right.item_code.to_string()))
        });

        let content = render_csv(&applications);
        if let Err(err) = write(&content) {
            warn!(
                "event=export module=service status=error format={} reason=write_failed",
                request.format.as_str()
            );
            return Err(ServiceError::Storage(err));
        }
        let file_name = request
            .file_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| default_file_name(request.format));

        let log = ExportLog {
            id: Uuid::new_v4(),
            category: request.main_category.clone(),
            status: request.status.map(|status| status.as_str().to_string()),
            start_date: request.date_from,
            end_date: request.date_to,
            record_count: applications.len() as i64,
            file_name,
            file_path: request.file_path.clone(),
            file_size: Some(content.len() as i64),
            format: request.format,
            exported_by_id: actor.user_id,
            exported_at: 0,
            download_count: 0,
        };
        let repo = SqliteExportLogRepository::try_new(self.conn)?;
        repo.create_export_log(&log)?;
        info!(
            "event=export module=service status=ok id={} records={} format={}",
            log.id,
            log.record_count,
            log.format.as_str()
        );

        let log = repo
            .get_export_log(log.id)?
            .ok_or(ServiceError::InconsistentState("export log missing after write"))?;
        Ok(ExportOutput { log, content })
    }

    pub fn history(&self, actor: &Actor, query: &ExportLogQuery) -> ServiceResult<Vec<ExportLog>> {
        require_permission(actor, Permission::Export)?;
        Ok(SqliteExportLogRepository::try_new(self.conn)?.list_export_logs(query)?)
    }

    /// Counts one download of a past export and returns the new total.
    pub fn record_download(&self, actor: &Actor, id: Uuid) -> ServiceResult<i64> {
        require_permission(actor, Permission::Export)?;
        Ok(SqliteExportLogRepository::try_new(self.conn)?.increment_download_count(id)?)
    }
}

/// Renders applications as CSV with a header row.
pub fn render_csv(applications: &[Application]) -> String {
    let mut out = String::new();
    let header: Vec<&str> = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(PackagingSection::ALL.iter().map(|section| section.title()))
        .collect();
    push_record(&mut out, header.iter().map(|value| Cow::Borrowed(*value)));

    for application in applications {
        let number = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
        let mut fields: Vec<Cow<'_, str>> = vec![
            Cow::Owned(application.item_code.to_string()),
            Cow::Borrowed(application.main_category.as_str()),
            Cow::Borrowed(application.sub_category.as_str()),
            Cow::Borrowed(application.spec_category.as_str()),
            Cow::Borrowed(application.item_name_cn.as_str()),
            text(&application.item_name_en),
            text(&application.material),
            text(&application.surface_finish),
            Cow::Owned(number(application.dimensions.length)),
            Cow::Owned(number(application.dimensions.width)),
            Cow::Owned(number(application.dimensions.height)),
            Cow::Owned(number(application.dimensions.weight)),
            Cow::Owned(application.moq.map(|v| v.to_string()).unwrap_or_default()),
            text(&application.unit),
            text(&application.customer_ref),
            text(&application.customer_name),
            text(&application.supplier_code),
            Cow::Borrowed(application.applicant_name.as_str()),
            Cow::Borrowed(application.status.as_str()),
            Cow::Owned(format_timestamp(application.submit_date)),
            Cow::Owned(application.approval_date.map(format_timestamp).unwrap_or_default()),
            text(&application.notes),
        ];
        for section in PackagingSection::ALL {
            fields.push(Cow::Owned(format_section(&application.packaging, section)));
        }
        push_record(&mut out, fields.into_iter());
    }
    out
}

/// Formats epoch milliseconds as `YYYY-MM-DD HH:MM` (UTC).
pub fn format_timestamp(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|value| value.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn default_file_name(format: ExportFormat) -> String {
    format!(
        "material_codes_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

fn text(value: &Option<String>) -> Cow<'_, str> {
    Cow::Borrowed(value.as_deref().unwrap_or_default())
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = Cow<'a, str>>) {
    for (index, field) in fields.enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(&field));
    }
    out.push_str("\r\n");
}

/// Quotes a field when it contains a delimiter, quote or line break.
fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_field, format_timestamp, render_csv};

    #[test]
    fn escape_quotes_only_when_needed() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn timestamp_renders_utc_minutes() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
        assert_eq!(format_timestamp(1_700_000_000_000), "2023-11-14 22:13");
    }

    #[test]
    fn empty_export_has_only_header() {
        let csv = render_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("Item Code,Main Category,"));
        assert!(csv.trim_end().ends_with("Container Loading,Other"));
    }
}
