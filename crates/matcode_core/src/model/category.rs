//! Product category taxonomy.
//!
//! The taxonomy has three levels. Sub (level 2) and spec (level 3)
//! categories both hang off a main (level 1) category; spec categories are
//! not scoped to a sub category.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference-catalog row id.
pub type CategoryId = i64;

/// Taxonomy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryLevel {
    /// One-letter product family, e.g. `H` (Handle).
    Main,
    /// Two-digit product type within a main category, e.g. `01` (Knob).
    Sub,
    /// One-letter specification within a main category, e.g. `C` (Chrome).
    Spec,
}

impl CategoryLevel {
    /// Stored `level` column value.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Main => 1,
            Self::Sub => 2,
            Self::Spec => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Main),
            2 => Some(Self::Sub),
            3 => Some(Self::Spec),
            _ => None,
        }
    }
}

/// One taxonomy node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub code: String,
    pub name: String,
    pub name_cn: Option<String>,
    pub description: Option<String>,
    pub level: CategoryLevel,
    /// Main category row id for levels 2 and 3; `None` for main categories.
    pub parent_id: Option<CategoryId>,
    /// Code of the owning main category (equals `code` at level 1).
    pub main_category_code: String,
    pub display_order: i64,
    pub is_active: bool,
}

impl Category {
    /// Human label in the `CODE - Name` shape used by selection lists.
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }
}

/// One main category with its sub and spec categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBranch {
    pub main: Category,
    /// Keyed by sub category code.
    pub sub_categories: BTreeMap<String, Category>,
    /// Keyed by spec category code.
    pub spec_categories: BTreeMap<String, Category>,
}

/// Full taxonomy keyed by main category code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTree {
    pub branches: BTreeMap<String, CategoryBranch>,
}

impl CategoryTree {
    /// Assembles a tree from flat rows. Rows whose main category is missing
    /// are dropped.
    pub fn from_rows(rows: Vec<Category>) -> Self {
        let mut branches: BTreeMap<String, CategoryBranch> = BTreeMap::new();
        let (mains, children): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|row| row.level == CategoryLevel::Main);

        for main in mains {
            branches.insert(
                main.code.clone(),
                CategoryBranch {
                    main,
                    sub_categories: BTreeMap::new(),
                    spec_categories: BTreeMap::new(),
                },
            );
        }

        for child in children {
            let Some(branch) = branches.get_mut(&child.main_category_code) else {
                continue;
            };
            match child.level {
                CategoryLevel::Sub => {
                    branch.sub_categories.insert(child.code.clone(), child);
                }
                CategoryLevel::Spec => {
                    branch.spec_categories.insert(child.code.clone(), child);
                }
                CategoryLevel::Main => {}
            }
        }

        Self { branches }
    }

    pub fn branch(&self, main_code: &str) -> Option<&CategoryBranch> {
        self.branches.get(main_code)
    }

    /// Returns whether `(main, sub, spec)` names an existing combination.
    pub fn contains(&self, main: &str, sub: &str, spec: &str) -> bool {
        self.branch(main).is_some_and(|branch| {
            branch.sub_categories.contains_key(sub) && branch.spec_categories.contains_key(spec)
        })
    }
}
