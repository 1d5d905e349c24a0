//! Supplier repository.

use crate::model::supplier::{Supplier, SupplierId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, like_contains, map_unique_violation,
    parse_uuid, push_pagination, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const SUPPLIER_SELECT_SQL: &str = "SELECT
    id,
    code,
    name,
    contact_person,
    email,
    phone,
    address,
    country,
    is_active,
    created_at,
    updated_at
FROM suppliers";

/// Query options for listing suppliers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplierListQuery {
    pub include_inactive: bool,
    /// Case-insensitive substring match on the code.
    pub code: Option<String>,
    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

pub trait SupplierRepository {
    fn create_supplier(&self, supplier: &Supplier) -> RepoResult<SupplierId>;
    fn update_supplier(&self, supplier: &Supplier) -> RepoResult<()>;
    fn get_supplier(&self, id: SupplierId) -> RepoResult<Option<Supplier>>;
    fn find_supplier_by_code(&self, code: &str) -> RepoResult<Option<Supplier>>;
    fn list_suppliers(&self, query: &SupplierListQuery) -> RepoResult<Vec<Supplier>>;
    fn delete_supplier(&self, id: SupplierId) -> RepoResult<()>;
}

/// SQLite-backed supplier repository.
pub struct SqliteSupplierRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSupplierRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["suppliers"])?;
        Ok(Self::new(conn))
    }
}

impl SupplierRepository for SqliteSupplierRepository<'_> {
    fn create_supplier(&self, supplier: &Supplier) -> RepoResult<SupplierId> {
        let mut supplier = supplier.clone();
        supplier.validate()?;

        self.conn
            .execute(
                "INSERT INTO suppliers (
                    id,
                    code,
                    name,
                    contact_person,
                    email,
                    phone,
                    address,
                    country,
                    is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    supplier.id.to_string(),
                    supplier.code.as_str(),
                    supplier.name.as_str(),
                    supplier.contact_person.as_deref(),
                    supplier.email.as_deref(),
                    supplier.phone.as_deref(),
                    supplier.address.as_deref(),
                    supplier.country.as_deref(),
                    bool_to_int(supplier.is_active),
                ],
            )
            .map_err(|err| map_unique_violation(err, "supplier", &supplier.code))?;

        Ok(supplier.id)
    }

    fn update_supplier(&self, supplier: &Supplier) -> RepoResult<()> {
        let mut supplier = supplier.clone();
        supplier.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE suppliers
                 SET
                    code = ?2,
                    name = ?3,
                    contact_person = ?4,
                    email = ?5,
                    phone = ?6,
                    address = ?7,
                    country = ?8,
                    is_active = ?9,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    supplier.id.to_string(),
                    supplier.code.as_str(),
                    supplier.name.as_str(),
                    supplier.contact_person.as_deref(),
                    supplier.email.as_deref(),
                    supplier.phone.as_deref(),
                    supplier.address.as_deref(),
                    supplier.country.as_deref(),
                    bool_to_int(supplier.is_active),
                ],
            )
            .map_err(|err| map_unique_violation(err, "supplier", &supplier.code))?;

        if changed == 0 {
            return Err(RepoError::not_found("supplier", supplier.id));
        }
        Ok(())
    }

    fn get_supplier(&self, id: SupplierId) -> RepoResult<Option<Supplier>> {
        self.conn
            .query_row(
                &format!("{SUPPLIER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_supplier_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_supplier_by_code(&self, code: &str) -> RepoResult<Option<Supplier>> {
        self.conn
            .query_row(
                &format!("{SUPPLIER_SELECT_SQL} WHERE code = ?1 COLLATE NOCASE;"),
                [code.trim()],
                |row| Ok(parse_supplier_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_suppliers(&self, query: &SupplierListQuery) -> RepoResult<Vec<Supplier>> {
        let mut sql = format!("{SUPPLIER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_inactive {
            sql.push_str(" AND is_active = 1");
        }
        if let Some(code) = query.code.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            sql.push_str(" AND code LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(like_contains(code)));
        }
        if let Some(name) = query.name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            sql.push_str(" AND name LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(like_contains(name)));
        }

        sql.push_str(" ORDER BY code ASC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut suppliers = Vec::new();
        while let Some(row) = rows.next()? {
            suppliers.push(parse_supplier_row(row)?);
        }
        Ok(suppliers)
    }

    fn delete_supplier(&self, id: SupplierId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM suppliers WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("supplier", id));
        }
        Ok(())
    }
}

fn parse_supplier_row(row: &Row<'_>) -> RepoResult<Supplier> {
    let id_text: String = row.get("id")?;
    Ok(Supplier {
        id: parse_uuid(&id_text, "suppliers.id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        contact_person: row.get("contact_person")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        country: row.get("country")?,
        is_active: int_to_bool(row.get("is_active")?, "suppliers.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
