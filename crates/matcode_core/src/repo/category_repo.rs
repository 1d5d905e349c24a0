//! Product category repository.
//!
//! # Invariants
//! - Listing APIs return active rows only, ordered by `display_order`.
//! - Sub and spec categories are looked up within their main category.

use crate::model::category::{Category, CategoryId, CategoryLevel, CategoryTree};
use crate::repo::{ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const CATEGORY_SELECT_SQL: &str = "SELECT
    id,
    code,
    name,
    name_cn,
    description,
    level,
    parent_id,
    main_category_code,
    display_order,
    is_active
FROM product_categories";

/// Repository interface for the category taxonomy.
pub trait CategoryRepository {
    fn list_main_categories(&self) -> RepoResult<Vec<Category>>;
    fn list_sub_categories(&self, main_code: &str) -> RepoResult<Vec<Category>>;
    fn list_spec_categories(&self, main_code: &str) -> RepoResult<Vec<Category>>;
    /// Loads every active category assembled into a tree.
    fn load_tree(&self) -> RepoResult<CategoryTree>;
    /// Finds one active category by level and code within a main category.
    fn find_category(
        &self,
        level: CategoryLevel,
        main_code: &str,
        code: &str,
    ) -> RepoResult<Option<Category>>;
    fn get_category(&self, id: CategoryId) -> RepoResult<Option<Category>>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["product_categories"])?;
        Ok(Self::new(conn))
    }

    fn list_level(&self, level: CategoryLevel, main_code: Option<&str>) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE level = ?1
               AND is_active = 1
               AND (?2 IS NULL OR main_category_code = ?2)
             ORDER BY display_order ASC, code ASC;"
        ))?;
        let mut rows = stmt.query(params![level.as_i64(), main_code])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn list_main_categories(&self) -> RepoResult<Vec<Category>> {
        self.list_level(CategoryLevel::Main, None)
    }

    fn list_sub_categories(&self, main_code: &str) -> RepoResult<Vec<Category>> {
        self.list_level(CategoryLevel::Sub, Some(main_code))
    }

    fn list_spec_categories(&self, main_code: &str) -> RepoResult<Vec<Category>> {
        self.list_level(CategoryLevel::Spec, Some(main_code))
    }

    fn load_tree(&self) -> RepoResult<CategoryTree> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE is_active = 1
             ORDER BY level ASC, display_order ASC, code ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(CategoryTree::from_rows(categories))
    }

    fn find_category(
        &self,
        level: CategoryLevel,
        main_code: &str,
        code: &str,
    ) -> RepoResult<Option<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE level = ?1
               AND main_category_code = ?2
               AND code = ?3
               AND is_active = 1;"
        ))?;
        let mut rows = stmt.query(params![level.as_i64(), main_code, code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_category_row(row)?));
        }
        Ok(None)
    }

    fn get_category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        self.conn
            .query_row(
                &format!("{CATEGORY_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_category_row(row)),
            )
            .optional()?
            .transpose()
    }
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    let level_value: i64 = row.get("level")?;
    let level = CategoryLevel::from_i64(level_value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category level `{level_value}` in product_categories.level"
        ))
    })?;

    Ok(Category {
        id: row.get("id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        name_cn: row.get("name_cn")?,
        description: row.get("description")?,
        level,
        parent_id: row.get("parent_id")?,
        main_category_code: row.get("main_category_code")?,
        display_order: row.get("display_order")?,
        is_active: int_to_bool(row.get("is_active")?, "product_categories.is_active")?,
    })
}
