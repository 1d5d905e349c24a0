//! Category taxonomy use-cases.

use crate::model::category::{Category, CategoryLevel, CategoryTree};
use crate::model::item_code::{validate_main_code, validate_spec_code, validate_sub_code};
use crate::repo::category_repo::CategoryRepository;
use crate::service::{ServiceError, ServiceResult};

/// Resolved main/sub/spec categories of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySelection {
    pub main: Category,
    pub sub: Category,
    pub spec: Category,
}

/// Category service facade over repository implementations.
pub struct CategoryService<R: CategoryRepository> {
    repo: R,
}

impl<R: CategoryRepository> CategoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn main_categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.repo.list_main_categories()?)
    }

    pub fn sub_categories(&self, main_code: &str) -> ServiceResult<Vec<Category>> {
        Ok(self.repo.list_sub_categories(main_code.trim())?)
    }

    pub fn spec_categories(&self, main_code: &str) -> ServiceResult<Vec<Category>> {
        Ok(self.repo.list_spec_categories(main_code.trim())?)
    }

    pub fn tree(&self) -> ServiceResult<CategoryTree> {
        Ok(self.repo.load_tree()?)
    }

    /// Resolves a main/sub/spec selection.
    ///
    /// Sub and spec must both exist under `main`; malformed codes fail with
    /// `Validation`, well-formed but unknown ones with `InvalidCategory`.
    pub fn validate_selection(
        &self,
        main: &str,
        sub: &str,
        spec: &str,
    ) -> ServiceResult<CategorySelection> {
        let (main, sub, spec) = (main.trim(), sub.trim(), spec.trim());
        validate_main_code(main)?;
        validate_sub_code(sub)?;
        validate_spec_code(spec)?;

        let invalid = || ServiceError::InvalidCategory {
            main: main.to_string(),
            sub: sub.to_string(),
            spec: spec.to_string(),
        };
        let main_category = self
            .repo
            .find_category(CategoryLevel::Main, main, main)?
            .ok_or_else(invalid)?;
        let sub_category = self
            .repo
            .find_category(CategoryLevel::Sub, main, sub)?
            .ok_or_else(invalid)?;
        let spec_category = self
            .repo
            .find_category(CategoryLevel::Spec, main, spec)?
            .ok_or_else(invalid)?;

        Ok(CategorySelection {
            main: main_category,
            sub: sub_category,
            spec: spec_category,
        })
    }
}
