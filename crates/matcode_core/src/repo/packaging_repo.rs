//! Packaging catalog, category defaults and saved templates.
//!
//! # Responsibility
//! - Read the packaging section/option catalog.
//! - Read seeded per-main-category defaults.
//! - Persist per-main-category packaging templates.
//!
//! # Invariants
//! - Catalog reads return active rows only, ordered by `display_order`.
//! - Template options are stored as a JSON array of option codes.

use crate::model::packaging::{
    PackagingCategory, PackagingOption, PackagingSection, PackagingSelection, PackagingSpec,
    PackagingTemplate,
};
use crate::model::user::UserId;
use crate::repo::{ensure_connection_ready, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;

const OPTION_SELECT_SQL: &str = "SELECT
    o.id,
    o.category_id,
    c.code AS section_code,
    o.code,
    o.name,
    o.name_cn,
    o.description,
    o.display_order,
    o.is_active
FROM packaging_options o
INNER JOIN packaging_categories c ON c.id = o.category_id";

/// Repository interface for packaging catalog and templates.
pub trait PackagingRepository {
    fn list_sections(&self) -> RepoResult<Vec<PackagingCategory>>;
    fn list_options(&self, section: PackagingSection) -> RepoResult<Vec<PackagingOption>>;
    /// Active options of every section, keyed by section.
    fn list_all_options(&self) -> RepoResult<BTreeMap<PackagingSection, Vec<PackagingOption>>>;
    /// Seeded default option codes for a main category.
    fn category_defaults(&self, main_code: &str) -> RepoResult<PackagingSpec>;
    /// Saved templates for a main category.
    fn list_templates(&self, main_code: &str) -> RepoResult<Vec<PackagingTemplate>>;
    /// Inserts or replaces the template for `(main, section)`.
    fn save_template(
        &self,
        main_code: &str,
        section: PackagingSection,
        selection: &PackagingSelection,
        saved_by: Option<UserId>,
    ) -> RepoResult<()>;
    fn delete_template(&self, main_code: &str, section: PackagingSection) -> RepoResult<()>;
}

/// SQLite-backed packaging repository.
pub struct SqlitePackagingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePackagingRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                "packaging_categories",
                "packaging_options",
                "category_packaging_defaults",
                "packaging_templates",
            ],
        )?;
        Ok(Self::new(conn))
    }
}

impl PackagingRepository for SqlitePackagingRepository<'_> {
    fn list_sections(&self) -> RepoResult<Vec<PackagingCategory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, name, name_cn, display_order, is_active
             FROM packaging_categories
             WHERE is_active = 1
             ORDER BY display_order ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut sections = Vec::new();
        while let Some(row) = rows.next()? {
            let code: String = row.get("code")?;
            sections.push(PackagingCategory {
                id: row.get("id")?,
                section: parse_section(&code, "packaging_categories.code")?,
                name: row.get("name")?,
                name_cn: row.get("name_cn")?,
                display_order: row.get("display_order")?,
                is_active: int_to_bool(row.get("is_active")?, "packaging_categories.is_active")?,
            });
        }
        Ok(sections)
    }

    fn list_options(&self, section: PackagingSection) -> RepoResult<Vec<PackagingOption>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OPTION_SELECT_SQL}
             WHERE c.code = ?1
               AND o.is_active = 1
             ORDER BY o.display_order ASC, o.id ASC;"
        ))?;
        let mut rows = stmt.query([section.as_str()])?;
        let mut options = Vec::new();
        while let Some(row) = rows.next()? {
            options.push(parse_option_row(row)?);
        }
        Ok(options)
    }

    fn list_all_options(&self) -> RepoResult<BTreeMap<PackagingSection, Vec<PackagingOption>>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OPTION_SELECT_SQL}
             WHERE o.is_active = 1
               AND c.is_active = 1
             ORDER BY c.display_order ASC, o.display_order ASC, o.id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut grouped: BTreeMap<PackagingSection, Vec<PackagingOption>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let option = parse_option_row(row)?;
            grouped.entry(option.section).or_default().push(option);
        }
        Ok(grouped)
    }

    fn category_defaults(&self, main_code: &str) -> RepoResult<PackagingSpec> {
        let mut stmt = self.conn.prepare(
            "SELECT c.code AS section_code, o.code AS option_code
             FROM category_packaging_defaults d
             INNER JOIN packaging_categories c ON c.id = d.packaging_category_id
             INNER JOIN packaging_options o ON o.id = d.packaging_option_id
             WHERE d.main_category_code = ?1
               AND o.is_active = 1
             ORDER BY c.display_order ASC, d.display_order ASC, o.display_order ASC;",
        )?;
        let mut rows = stmt.query([main_code])?;
        let mut spec = PackagingSpec::new();
        while let Some(row) = rows.next()? {
            let section_code: String = row.get("section_code")?;
            let section = parse_section(&section_code, "packaging_categories.code")?;
            spec.entry(section)
                .or_insert_with(PackagingSelection::default)
                .options
                .push(row.get("option_code")?);
        }
        Ok(spec)
    }

    fn list_templates(&self, main_code: &str) -> RepoResult<Vec<PackagingTemplate>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                t.main_category_code,
                c.code AS section_code,
                t.default_options,
                t.default_description,
                t.updated_at
             FROM packaging_templates t
             INNER JOIN packaging_categories c ON c.id = t.packaging_category_id
             WHERE t.main_category_code = ?1
             ORDER BY c.display_order ASC;",
        )?;
        let mut rows = stmt.query([main_code])?;
        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            let section_code: String = row.get("section_code")?;
            let options_json: String = row.get("default_options")?;
            let options: Vec<String> = serde_json::from_str(&options_json).map_err(|err| {
                RepoError::InvalidData(format!(
                    "invalid json in packaging_templates.default_options: {err}"
                ))
            })?;
            templates.push(PackagingTemplate {
                main_category_code: row.get("main_category_code")?,
                section: parse_section(&section_code, "packaging_categories.code")?,
                selection: PackagingSelection {
                    options,
                    description: row.get("default_description")?,
                },
                updated_at: row.get("updated_at")?,
            });
        }
        Ok(templates)
    }

    fn save_template(
        &self,
        main_code: &str,
        section: PackagingSection,
        selection: &PackagingSelection,
        saved_by: Option<UserId>,
    ) -> RepoResult<()> {
        let options_json = serde_json::to_string(&selection.options).map_err(|err| {
            RepoError::InvalidData(format!("cannot encode template options: {err}"))
        })?;
        let changed = self.conn.execute(
            "INSERT INTO packaging_templates (
                main_category_code,
                packaging_category_id,
                default_options,
                default_description,
                created_by_id
             )
             SELECT ?1, id, ?3, ?4, ?5
             FROM packaging_categories
             WHERE code = ?2
             ON CONFLICT(main_category_code, packaging_category_id) DO UPDATE SET
                default_options = excluded.default_options,
                default_description = excluded.default_description,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                main_code,
                section.as_str(),
                options_json,
                selection.description.as_deref(),
                saved_by.map(|id| id.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("packaging section", section));
        }
        Ok(())
    }

    fn delete_template(&self, main_code: &str, section: PackagingSection) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM packaging_templates
             WHERE main_category_code = ?1
               AND packaging_category_id = (
                   SELECT id FROM packaging_categories WHERE code = ?2
               );",
            params![main_code, section.as_str()],
        )?;
        Ok(())
    }
}

pub(crate) fn parse_section(value: &str, column: &str) -> RepoResult<PackagingSection> {
    PackagingSection::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid packaging section `{value}` in {column}"))
    })
}

fn parse_option_row(row: &Row<'_>) -> RepoResult<PackagingOption> {
    let section_code: String = row.get("section_code")?;
    Ok(PackagingOption {
        id: row.get("id")?,
        category_id: row.get("category_id")?,
        section: parse_section(&section_code, "packaging_categories.code")?,
        code: row.get("code")?,
        name: row.get("name")?,
        name_cn: row.get("name_cn")?,
        description: row.get("description")?,
        display_order: row.get("display_order")?,
        is_active: int_to_bool(row.get("is_active")?, "packaging_options.is_active")?,
    })
}
