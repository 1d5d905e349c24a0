//! Attachment upload, download and removal.
//!
//! # Responsibility
//! - Store attachment bytes through a [`BlobStore`] and metadata in SQLite.
//! - Keep blobs and metadata consistent across partial failures.
//!
//! # Invariants
//! - Storage paths are
//!   `applications/{application_id}/{timestamp}-{attachment_id}-{name}` with a
//!   sanitized name, so two uploads never share a path.
//! - Stores never overwrite: `put` on an existing path fails with
//!   `AlreadyExists`.
//! - A blob whose metadata insert fails is deleted again. Only the blob the
//!   failing call wrote is removed.
//! - Deleting one attachment removes the blob before the metadata row.
//! - Deleting an application removes its attachment blobs with it.

use crate::model::application::ApplicationId;
use crate::model::attachment::{sanitize_file_name, Attachment, AttachmentId, AttachmentKind};
use crate::model::user::{Actor, Permission, Role};
use crate::model::{optional_text, require_text};
use crate::repo::application_repo::{ApplicationRepository, SqliteApplicationRepository};
use crate::repo::attachment_repo::{AttachmentRepository, SqliteAttachmentRepository};
use crate::service::application_service::ApplicationService;
use crate::service::{require_permission, ServiceError, ServiceResult};
use log::{error, info, warn};
use rusqlite::Connection;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Byte storage addressed by relative slash-separated paths.
pub trait BlobStore {
    /// Writes a new blob. Fails with `AlreadyExists` when `path` is taken.
    fn put(&self, path: &str, bytes: &[u8]) -> io::Result<()>;
    fn get(&self, path: &str) -> io::Result<Vec<u8>>;
    /// Removes a blob. Missing blobs are not an error.
    fn delete(&self, path: &str) -> io::Result<()>;
}

/// Filesystem blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("blob path must be relative and normalized: `{path}`"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn get(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path)?)
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        match fs::remove_file(self.resolve(path)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// One file handed to [`AttachmentService::upload`].
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
    pub description: Option<&'a str>,
}

/// Attachment service bound to one connection and blob store.
pub struct AttachmentService<'conn, B: BlobStore> {
    conn: &'conn Connection,
    store: B,
}

impl<'conn, B: BlobStore> AttachmentService<'conn, B> {
    pub fn new(conn: &'conn Connection, store: B) -> Self {
        Self { conn, store }
    }

    pub fn upload(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
        request: UploadRequest<'_>,
    ) -> ServiceResult<Attachment> {
        require_permission(actor, Permission::Apply)?;
        let original_file_name = require_text("file_name", request.file_name)?;
        if SqliteApplicationRepository::try_new(self.conn)?
            .get_application(application_id)?
            .is_none()
        {
            return Err(ServiceError::NotFound {
                entity: "application",
                key: application_id.to_string(),
            });
        }

        let id = Uuid::new_v4();
        let file_name = sanitize_file_name(&original_file_name);
        let storage_path = format!(
            "applications/{application_id}/{}-{}-{file_name}",
            timestamp_ms(),
            id.simple()
        );
        let attachment = Attachment {
            id,
            application_id,
            file_type: AttachmentKind::classify(request.mime_type, &original_file_name),
            file_name,
            original_file_name,
            file_size: i64::try_from(request.bytes.len()).unwrap_or(i64::MAX),
            mime_type: request.mime_type.trim().to_string(),
            storage_path,
            uploaded_by_id: actor.user_id,
            uploaded_at: 0,
            description: optional_text(request.description),
        };

        self.store.put(&attachment.storage_path, request.bytes)?;
        let repo = SqliteAttachmentRepository::try_new(self.conn)?;
        if let Err(err) = repo.insert_attachment(&attachment) {
            warn!(
                "event=attachment_upload module=service status=error id={} reason=metadata_insert",
                attachment.id
            );
            if let Err(cleanup) = self.store.delete(&attachment.storage_path) {
                error!(
                    "event=attachment_cleanup module=service status=error id={} error={cleanup}",
                    attachment.id
                );
            }
            return Err(err.into());
        }

        info!(
            "event=attachment_upload module=service status=ok id={} application_id={application_id} kind={} size={}",
            attachment.id,
            attachment.file_type.as_str(),
            attachment.file_size
        );
        repo.get_attachment(attachment.id)?
            .ok_or(ServiceError::InconsistentState(
                "uploaded attachment not found in read-back",
            ))
    }

    /// Attachments of one application, newest first.
    pub fn list(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
    ) -> ServiceResult<Vec<Attachment>> {
        require_permission(actor, Permission::Query)?;
        Ok(SqliteAttachmentRepository::try_new(self.conn)?.list_attachments(application_id)?)
    }

    /// Returns metadata and bytes of one attachment.
    pub fn download(
        &self,
        actor: &Actor,
        id: AttachmentId,
    ) -> ServiceResult<(Attachment, Vec<u8>)> {
        require_permission(actor, Permission::Query)?;
        let attachment = self.load(id)?;
        let bytes = self.store.get(&attachment.storage_path)?;
        Ok((attachment, bytes))
    }

    /// Removes one attachment. Allowed for its uploader, reviewers and admins.
    pub fn delete(&self, actor: &Actor, id: AttachmentId) -> ServiceResult<()> {
        let attachment = self.load(id)?;
        if attachment.uploaded_by_id != actor.user_id && actor.role == Role::Applicant {
            return Err(ServiceError::PermissionDenied {
                role: actor.role,
                permission: Permission::Review,
            });
        }

        self.store.delete(&attachment.storage_path)?;
        SqliteAttachmentRepository::try_new(self.conn)?.delete_attachment(id)?;
        info!("event=attachment_delete module=service status=ok id={id}");
        Ok(())
    }

    /// Deletes an application together with its attachments.
    ///
    /// Rows go first, in one transaction; blobs are removed after commit.
    /// Every blob is attempted; the first storage failure is returned, and
    /// the application stays deleted.
    pub fn delete_application(
        &self,
        actor: &Actor,
        application_id: ApplicationId,
    ) -> ServiceResult<()> {
        let removed =
            ApplicationService::new(self.conn).delete_record(actor, application_id, true)?;

        let mut first_failure = None;
        for attachment in &removed {
            if let Err(err) = self.store.delete(&attachment.storage_path) {
                error!(
                    "event=attachment_cleanup module=service status=error id={} application_id={application_id} error={err}",
                    attachment.id
                );
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(ServiceError::Storage(err)),
            None => Ok(()),
        }
    }

    fn load(&self, id: AttachmentId) -> ServiceResult<Attachment> {
        SqliteAttachmentRepository::try_new(self.conn)?
            .get_attachment(id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "attachment",
                key: id.to_string(),
            })
    }
}

fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
