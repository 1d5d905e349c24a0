//! Export history repository.

use crate::model::export_log::{ExportFormat, ExportLog};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, parse_uuid, push_pagination, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const EXPORT_LOG_SELECT_SQL: &str = "SELECT
    id,
    category,
    status,
    start_date,
    end_date,
    record_count,
    file_name,
    file_path,
    file_size,
    format,
    exported_by_id,
    exported_at,
    download_count
FROM export_logs";

/// Query options for export history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportLogQuery {
    pub exported_by: Option<UserId>,
    /// Inclusive lower bound on `exported_at`.
    pub from: Option<i64>,
    /// Inclusive upper bound on `exported_at`.
    pub to: Option<i64>,
    pub limit: Option<u32>,
    pub offset: u32,
}

pub trait ExportLogRepository {
    fn create_export_log(&self, log: &ExportLog) -> RepoResult<Uuid>;
    fn get_export_log(&self, id: Uuid) -> RepoResult<Option<ExportLog>>;
    /// Lists export logs, newest first.
    fn list_export_logs(&self, query: &ExportLogQuery) -> RepoResult<Vec<ExportLog>>;
    /// Bumps the download counter and returns the new value.
    fn increment_download_count(&self, id: Uuid) -> RepoResult<i64>;
}

/// SQLite-backed export log repository.
pub struct SqliteExportLogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteExportLogRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["export_logs"])?;
        Ok(Self::new(conn))
    }
}

impl ExportLogRepository for SqliteExportLogRepository<'_> {
    fn create_export_log(&self, log: &ExportLog) -> RepoResult<Uuid> {
        self.conn.execute(
            "INSERT INTO export_logs (
                id,
                category,
                status,
                start_date,
                end_date,
                record_count,
                file_name,
                file_path,
                file_size,
                format,
                exported_by_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                log.id.to_string(),
                log.category.as_deref(),
                log.status.as_deref(),
                log.start_date,
                log.end_date,
                log.record_count,
                log.file_name.as_str(),
                log.file_path.as_deref(),
                log.file_size,
                log.format.as_str(),
                log.exported_by_id.to_string(),
            ],
        )?;
        Ok(log.id)
    }

    fn get_export_log(&self, id: Uuid) -> RepoResult<Option<ExportLog>> {
        self.conn
            .query_row(
                &format!("{EXPORT_LOG_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_export_log_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_export_logs(&self, query: &ExportLogQuery) -> RepoResult<Vec<ExportLog>> {
        let mut sql = format!("{EXPORT_LOG_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(user_id) = query.exported_by {
            sql.push_str(" AND exported_by_id = ?");
            bind_values.push(Value::Text(user_id.to_string()));
        }
        if let Some(from) = query.from {
            sql.push_str(" AND exported_at >= ?");
            bind_values.push(Value::Integer(from));
        }
        if let Some(to) = query.to {
            sql.push_str(" AND exported_at <= ?");
            bind_values.push(Value::Integer(to));
        }

        sql.push_str(" ORDER BY exported_at DESC, rowid DESC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(parse_export_log_row(row)?);
        }
        Ok(logs)
    }

    fn increment_download_count(&self, id: Uuid) -> RepoResult<i64> {
        self.conn
            .query_row(
                "UPDATE export_logs
                 SET download_count = download_count + 1
                 WHERE id = ?1
                 RETURNING download_count;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("export log", id))
    }
}

fn parse_export_log_row(row: &Row<'_>) -> RepoResult<ExportLog> {
    let id_text: String = row.get("id")?;
    let exporter_text: String = row.get("exported_by_id")?;
    let format_text: String = row.get("format")?;
    let format = ExportFormat::parse(&format_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid export format `{format_text}` in export_logs.format"
        ))
    })?;

    Ok(ExportLog {
        id: parse_uuid(&id_text, "export_logs.id")?,
        category: row.get("category")?,
        status: row.get("status")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        record_count: row.get("record_count")?,
        file_name: row.get("file_name")?,
        file_path: row.get("file_path")?,
        file_size: row.get("file_size")?,
        format,
        exported_by_id: parse_uuid(&exporter_text, "export_logs.exported_by_id")?,
        exported_at: row.get("exported_at")?,
        download_count: row.get("download_count")?,
    })
}
