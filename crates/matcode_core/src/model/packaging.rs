//! Packaging catalog and per-application packaging specification.
//!
//! # Invariants
//! - Every selection belongs to exactly one of the eight packaging sections.
//! - Option codes inside one selection are unique and keep caller order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Reference-catalog row id for packaging categories and options.
pub type PackagingId = i64;

/// The fixed packaging sections of a material application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagingSection {
    ProductPackaging,
    AccessoriesContent,
    Accessories,
    InnerBox,
    OuterBox,
    Transport,
    Container,
    Other,
}

impl PackagingSection {
    pub const ALL: [Self; 8] = [
        Self::ProductPackaging,
        Self::AccessoriesContent,
        Self::Accessories,
        Self::InnerBox,
        Self::OuterBox,
        Self::Transport,
        Self::Container,
        Self::Other,
    ];

    /// Stored `packaging_categories.code` value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProductPackaging => "product_packaging",
            Self::AccessoriesContent => "accessories_content",
            Self::Accessories => "accessories",
            Self::InnerBox => "inner_box",
            Self::OuterBox => "outer_box",
            Self::Transport => "transport",
            Self::Container => "container",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == value)
    }

    /// Column header used by exports.
    pub fn title(self) -> &'static str {
        match self {
            Self::ProductPackaging => "Product Packaging",
            Self::AccessoriesContent => "Accessories Content",
            Self::Accessories => "Accessories",
            Self::InnerBox => "Inner Box",
            Self::OuterBox => "Outer Box",
            Self::Transport => "Transport & Pallet",
            Self::Container => "Container Loading",
            Self::Other => "Other",
        }
    }
}

impl Display for PackagingSection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packaging section catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingCategory {
    pub id: PackagingId,
    pub section: PackagingSection,
    pub name: String,
    pub name_cn: Option<String>,
    pub display_order: i64,
    pub is_active: bool,
}

/// Selectable option inside one packaging section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingOption {
    pub id: PackagingId,
    pub category_id: PackagingId,
    pub section: PackagingSection,
    pub code: String,
    pub name: String,
    pub name_cn: Option<String>,
    pub description: Option<String>,
    pub display_order: i64,
    pub is_active: bool,
}

/// Options checked in one section plus free-text remarks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingSelection {
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PackagingSelection {
    pub fn with_options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            description: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.description.is_none()
    }

    /// Trims option codes, drops blanks and duplicates, and blanks out an
    /// empty description.
    pub fn normalized(&self) -> Self {
        let mut options: Vec<String> = Vec::with_capacity(self.options.len());
        for option in &self.options {
            let trimmed = option.trim();
            if trimmed.is_empty() || options.iter().any(|existing| existing == trimmed) {
                continue;
            }
            options.push(trimmed.to_string());
        }
        Self {
            options,
            description: super::optional_text(self.description.as_deref()),
        }
    }

    /// Renders the selection as `[a, b] | description` for flat exports.
    pub fn display_line(&self) -> String {
        let mut parts = Vec::new();
        if !self.options.is_empty() {
            parts.push(format!("[{}]", self.options.join(", ")));
        }
        if let Some(description) = self.description.as_deref() {
            parts.push(description.to_string());
        }
        parts.join(" | ")
    }
}

/// Packaging specification for one application, keyed by section.
pub type PackagingSpec = BTreeMap<PackagingSection, PackagingSelection>;

/// Saved per-main-category packaging template for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingTemplate {
    pub main_category_code: String,
    pub section: PackagingSection,
    pub selection: PackagingSelection,
    pub updated_at: i64,
}
