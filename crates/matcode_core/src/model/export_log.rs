//! Export history records.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Requested export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Xlsx => "XLSX",
            Self::Pdf => "PDF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CSV" => Some(Self::Csv),
            "XLSX" => Some(Self::Xlsx),
            "PDF" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
        }
    }
}

/// One completed export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLog {
    pub id: Uuid,
    /// Main category filter, `None` for all.
    pub category: Option<String>,
    /// Status filter, `None` for all.
    pub status: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub record_count: i64,
    pub file_name: String,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub format: ExportFormat,
    pub exported_by_id: UserId,
    pub exported_at: i64,
    pub download_count: i64,
}

#[cfg(test)]
mod tests {
    use super::ExportFormat;

    #[test]
    fn format_parse_ignores_case() {
        assert_eq!(ExportFormat::parse("csv"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse("XLSX"), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::parse("json"), None);
        assert_eq!(ExportFormat::Pdf.extension(), "pdf");
    }
}
