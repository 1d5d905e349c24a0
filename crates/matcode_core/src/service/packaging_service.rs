//! Packaging catalog and template use-cases.
//!
//! # Invariants
//! - A saved template replaces the seeded defaults for its section only.
//! - Template writes require `Permission::Packaging`.

use crate::model::item_code::validate_main_code;
use crate::model::packaging::{
    PackagingCategory, PackagingOption, PackagingSection, PackagingSelection, PackagingSpec,
};
use crate::model::user::{Actor, Permission};
use crate::repo::packaging_repo::PackagingRepository;
use crate::service::{require_permission, ServiceError, ServiceResult};
use log::info;
use std::collections::BTreeMap;

/// Packaging service facade over repository implementations.
pub struct PackagingService<R: PackagingRepository> {
    repo: R,
}

impl<R: PackagingRepository> PackagingService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn sections(&self) -> ServiceResult<Vec<PackagingCategory>> {
        Ok(self.repo.list_sections()?)
    }

    pub fn options(&self, section: PackagingSection) -> ServiceResult<Vec<PackagingOption>> {
        Ok(self.repo.list_options(section)?)
    }

    pub fn catalog(&self) -> ServiceResult<BTreeMap<PackagingSection, Vec<PackagingOption>>> {
        Ok(self.repo.list_all_options()?)
    }

    /// Default packaging for a new application in `main_code`.
    pub fn defaults_for(&self, main_code: &str) -> ServiceResult<PackagingSpec> {
        let main_code = main_code.trim();
        let mut spec = self.repo.category_defaults(main_code)?;
        for template in self.repo.list_templates(main_code)? {
            spec.insert(template.section, template.selection);
        }
        spec.retain(|_, selection| !selection.is_empty());
        Ok(spec)
    }

    pub fn save_template(
        &self,
        actor: &Actor,
        main_code: &str,
        section: PackagingSection,
        selection: &PackagingSelection,
    ) -> ServiceResult<()> {
        require_permission(actor, Permission::Packaging)?;
        let main_code = main_code.trim();
        validate_main_code(main_code)?;
        let selection = selection.normalized();
        self.check_options(section, &selection)?;

        self.repo
            .save_template(main_code, section, &selection, Some(actor.user_id))?;
        info!(
            "event=packaging_template_save module=service status=ok main={main_code} section={section} options={}",
            selection.options.len()
        );
        Ok(())
    }

    pub fn delete_template(
        &self,
        actor: &Actor,
        main_code: &str,
        section: PackagingSection,
    ) -> ServiceResult<()> {
        require_permission(actor, Permission::Packaging)?;
        self.repo.delete_template(main_code.trim(), section)?;
        Ok(())
    }

    /// Rejects option codes that are not in the active catalog.
    pub fn validate_spec(&self, spec: &PackagingSpec) -> ServiceResult<()> {
        let catalog = self.repo.list_all_options()?;
        for (section, selection) in spec {
            check_against(&catalog, *section, selection)?;
        }
        Ok(())
    }

    fn check_options(
        &self,
        section: PackagingSection,
        selection: &PackagingSelection,
    ) -> ServiceResult<()> {
        let catalog = self.repo.list_all_options()?;
        check_against(&catalog, section, selection)
    }
}

/// Renders one section for flat exports: `[a, b] | description`.
pub fn format_section(spec: &PackagingSpec, section: PackagingSection) -> String {
    spec.get(&section)
        .map(PackagingSelection::display_line)
        .unwrap_or_default()
}

fn check_against(
    catalog: &BTreeMap<PackagingSection, Vec<PackagingOption>>,
    section: PackagingSection,
    selection: &PackagingSelection,
) -> ServiceResult<()> {
    let known = catalog.get(&section).map(Vec::as_slice).unwrap_or_default();
    for code in &selection.options {
        if !known.iter().any(|option| option.code == *code) {
            return Err(ServiceError::UnknownPackagingOption {
                section,
                code: code.clone(),
            });
        }
    }
    Ok(())
}
