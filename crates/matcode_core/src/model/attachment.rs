//! File attachments linked to applications.
//!
//! # Invariants
//! - `storage_path` is unique and relative to the blob store root.
//! - Stored file names only contain ASCII letters, digits, `.`, `-` and `_`.

use crate::model::application::ApplicationId;
use crate::model::user::UserId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AttachmentId = Uuid;

static UNSAFE_NAME_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9.\-]").expect("valid file name regex"));

/// Coarse attachment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Document,
    Drawing,
    Other,
}

impl AttachmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Drawing => "drawing",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(Self::Image),
            "document" => Some(Self::Document),
            "drawing" => Some(Self::Drawing),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Classifies by MIME type, falling back to the file extension for CAD
    /// drawings which usually arrive as `application/octet-stream`.
    pub fn classify(mime_type: &str, file_name: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if mime.starts_with("image/") {
            Self::Image
        } else if mime.contains("pdf") || mime.contains("document") || mime.contains("word") {
            Self::Document
        } else if mime.contains("dwg")
            || mime.contains("dxf")
            || matches!(extension.as_str(), "dwg" | "dxf")
        {
            Self::Drawing
        } else {
            Self::Other
        }
    }
}

/// Replaces every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_NAME_CHARS_RE.replace_all(name.trim(), "_").into_owned()
}

/// Stored attachment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub application_id: ApplicationId,
    /// Sanitized name used in the storage path.
    pub file_name: String,
    pub original_file_name: String,
    pub file_type: AttachmentKind,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub uploaded_by_id: UserId,
    pub uploaded_at: i64,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{sanitize_file_name, AttachmentKind};

    #[test]
    fn classify_uses_mime_then_extension() {
        assert_eq!(
            AttachmentKind::classify("image/png", "photo.png"),
            AttachmentKind::Image
        );
        assert_eq!(
            AttachmentKind::classify("application/pdf", "spec.pdf"),
            AttachmentKind::Document
        );
        assert_eq!(
            AttachmentKind::classify(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "spec.docx"
            ),
            AttachmentKind::Document
        );
        assert_eq!(
            AttachmentKind::classify("application/octet-stream", "knob.DWG"),
            AttachmentKind::Drawing
        );
        assert_eq!(
            AttachmentKind::classify("image/vnd.dxf", "knob.dxf"),
            AttachmentKind::Image
        );
        assert_eq!(
            AttachmentKind::classify("application/zip", "bundle.zip"),
            AttachmentKind::Other
        );
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("knob drawing (v2).pdf"), "knob_drawing__v2_.pdf");
        assert_eq!(sanitize_file_name("規格書.pdf"), "___.pdf");
        assert_eq!(sanitize_file_name("a-b.c"), "a-b.c");
    }
}
