//! Attachment metadata repository.

use crate::model::application::ApplicationId;
use crate::model::attachment::{Attachment, AttachmentId, AttachmentKind};
use crate::repo::{
    ensure_connection_ready, map_unique_violation, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ATTACHMENT_SELECT_SQL: &str = "SELECT
    id,
    application_id,
    file_name,
    original_file_name,
    file_type,
    file_size,
    mime_type,
    storage_path,
    uploaded_by_id,
    uploaded_at,
    description
FROM attachments";

pub trait AttachmentRepository {
    fn insert_attachment(&self, attachment: &Attachment) -> RepoResult<AttachmentId>;
    fn get_attachment(&self, id: AttachmentId) -> RepoResult<Option<Attachment>>;
    /// Lists attachments of one application, newest first.
    fn list_attachments(&self, application_id: ApplicationId) -> RepoResult<Vec<Attachment>>;
    fn delete_attachment(&self, id: AttachmentId) -> RepoResult<()>;
}

/// SQLite-backed attachment repository.
pub struct SqliteAttachmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttachmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["attachments"])?;
        Ok(Self::new(conn))
    }
}

impl AttachmentRepository for SqliteAttachmentRepository<'_> {
    fn insert_attachment(&self, attachment: &Attachment) -> RepoResult<AttachmentId> {
        self.conn
            .execute(
                "INSERT INTO attachments (
                    id,
                    application_id,
                    file_name,
                    original_file_name,
                    file_type,
                    file_size,
                    mime_type,
                    storage_path,
                    uploaded_by_id,
                    description
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
                params![
                    attachment.id.to_string(),
                    attachment.application_id.to_string(),
                    attachment.file_name.as_str(),
                    attachment.original_file_name.as_str(),
                    attachment.file_type.as_str(),
                    attachment.file_size,
                    attachment.mime_type.as_str(),
                    attachment.storage_path.as_str(),
                    attachment.uploaded_by_id.to_string(),
                    attachment.description.as_deref(),
                ],
            )
            .map_err(|err| map_unique_violation(err, "attachment", &attachment.storage_path))?;
        Ok(attachment.id)
    }

    fn get_attachment(&self, id: AttachmentId) -> RepoResult<Option<Attachment>> {
        self.conn
            .query_row(
                &format!("{ATTACHMENT_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_attachment_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_attachments(&self, application_id: ApplicationId) -> RepoResult<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTACHMENT_SELECT_SQL}
             WHERE application_id = ?1
             ORDER BY uploaded_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query([application_id.to_string()])?;
        let mut attachments = Vec::new();
        while let Some(row) = rows.next()? {
            attachments.push(parse_attachment_row(row)?);
        }
        Ok(attachments)
    }

    fn delete_attachment(&self, id: AttachmentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM attachments WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("attachment", id));
        }
        Ok(())
    }
}

fn parse_attachment_row(row: &Row<'_>) -> RepoResult<Attachment> {
    let id_text: String = row.get("id")?;
    let application_text: String = row.get("application_id")?;
    let uploader_text: String = row.get("uploaded_by_id")?;
    let kind_text: String = row.get("file_type")?;
    let file_type = AttachmentKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid attachment kind `{kind_text}` in attachments.file_type"
        ))
    })?;

    Ok(Attachment {
        id: parse_uuid(&id_text, "attachments.id")?,
        application_id: parse_uuid(&application_text, "attachments.application_id")?,
        file_name: row.get("file_name")?,
        original_file_name: row.get("original_file_name")?,
        file_type,
        file_size: row.get("file_size")?,
        mime_type: row.get("mime_type")?,
        storage_path: row.get("storage_path")?,
        uploaded_by_id: parse_uuid(&uploader_text, "attachments.uploaded_by_id")?,
        uploaded_at: row.get("uploaded_at")?,
        description: row.get("description")?,
    })
}
