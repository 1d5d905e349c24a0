//! Supplier master data use-cases.
//!
//! # Invariants
//! - Reads need `Permission::Query`, writes need `Permission::Settings`.
//! - Supplier codes are unique, case-insensitively.

use crate::model::supplier::{Supplier, SupplierId};
use crate::model::user::{Actor, Permission};
use crate::repo::supplier_repo::{SupplierListQuery, SupplierRepository};
use crate::service::{require_permission, ServiceError, ServiceResult};
use log::info;

/// Supplier service facade over repository implementations.
pub struct SupplierService<R: SupplierRepository> {
    repo: R,
}

impl<R: SupplierRepository> SupplierService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create(&self, actor: &Actor, mut supplier: Supplier) -> ServiceResult<Supplier> {
        require_permission(actor, Permission::Settings)?;
        supplier.validate()?;
        let id = self.repo.create_supplier(&supplier)?;
        info!(
            "event=supplier_create module=service status=ok id={id} code={}",
            supplier.code
        );
        self.load(id)
    }

    pub fn update(&self, actor: &Actor, mut supplier: Supplier) -> ServiceResult<Supplier> {
        require_permission(actor, Permission::Settings)?;
        supplier.validate()?;
        self.repo.update_supplier(&supplier)?;
        info!(
            "event=supplier_update module=service status=ok id={} code={}",
            supplier.id, supplier.code
        );
        self.load(supplier.id)
    }

    pub fn get(&self, actor: &Actor, id: SupplierId) -> ServiceResult<Supplier> {
        require_permission(actor, Permission::Query)?;
        self.load(id)
    }

    pub fn find_by_code(&self, actor: &Actor, code: &str) -> ServiceResult<Option<Supplier>> {
        require_permission(actor, Permission::Query)?;
        Ok(self.repo.find_supplier_by_code(code.trim())?)
    }

    pub fn list(&self, actor: &Actor, query: &SupplierListQuery) -> ServiceResult<Vec<Supplier>> {
        require_permission(actor, Permission::Query)?;
        Ok(self.repo.list_suppliers(query)?)
    }

    /// Marks a supplier inactive so new applications can no longer pick it.
    pub fn deactivate(&self, actor: &Actor, id: SupplierId) -> ServiceResult<Supplier> {
        require_permission(actor, Permission::Settings)?;
        let mut supplier = self.load(id)?;
        supplier.is_active = false;
        self.repo.update_supplier(&supplier)?;
        info!("event=supplier_deactivate module=service status=ok id={id}");
        self.load(id)
    }

    /// Removes a supplier. Applications that referenced it lose the link.
    pub fn delete(&self, actor: &Actor, id: SupplierId) -> ServiceResult<()> {
        require_permission(actor, Permission::Settings)?;
        self.repo.delete_supplier(id)?;
        info!("event=supplier_delete module=service status=ok id={id}");
        Ok(())
    }

    fn load(&self, id: SupplierId) -> ServiceResult<Supplier> {
        self.repo
            .get_supplier(id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "supplier",
                key: id.to_string(),
            })
    }
}
