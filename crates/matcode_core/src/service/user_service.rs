//! User profile use-cases.
//!
//! # Responsibility
//! - Manage profiles and roles behind `Permission::Users`.
//! - Resolve a username into the [`Actor`] other services act as.
//!
//! # Invariants
//! - Inactive users never resolve into an actor.
//! - The first admin can only be created while no admin exists.

use crate::model::user::{Actor, Permission, Role, UserId, UserProfile};
use crate::repo::user_repo::{UserListQuery, UserRepository};
use crate::service::{require_permission, ServiceError, ServiceResult};
use log::{info, warn};

/// User service facade over repository implementations.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates the first admin account of a fresh database.
    pub fn bootstrap_admin(&self, username: &str) -> ServiceResult<UserProfile> {
        let existing = self.repo.list_users(&UserListQuery {
            role: Some(Role::Admin),
            limit: Some(1),
            ..UserListQuery::default()
        })?;
        if !existing.is_empty() {
            warn!("event=user_bootstrap module=service status=error reason=admin_exists");
            return Err(ServiceError::Conflict {
                entity: "admin",
                key: existing[0].username.clone(),
            });
        }

        let mut profile = UserProfile::new(username, Role::Admin);
        profile.validate()?;
        let id = self.repo.create_user(&profile)?;
        info!("event=user_bootstrap module=service status=ok id={id}");
        self.load(id)
    }

    pub fn create(&self, actor: &Actor, mut profile: UserProfile) -> ServiceResult<UserProfile> {
        require_permission(actor, Permission::Users)?;
        profile.validate()?;
        let id = self.repo.create_user(&profile)?;
        info!(
            "event=user_create module=service status=ok id={id} role={}",
            profile.role
        );
        self.load(id)
    }

    pub fn update(&self, actor: &Actor, mut profile: UserProfile) -> ServiceResult<UserProfile> {
        require_permission(actor, Permission::Users)?;
        profile.validate()?;
        self.repo.update_user(&profile)?;
        info!(
            "event=user_update module=service status=ok id={} role={}",
            profile.id, profile.role
        );
        self.load(profile.id)
    }

    pub fn set_active(&self, actor: &Actor, id: UserId, is_active: bool) -> ServiceResult<UserProfile> {
        require_permission(actor, Permission::Users)?;
        if !is_active && id == actor.user_id {
            return Err(ServiceError::Conflict {
                entity: "user",
                key: "cannot deactivate the acting user".to_string(),
            });
        }
        self.repo.set_user_active(id, is_active)?;
        info!("event=user_set_active module=service status=ok id={id} active={is_active}");
        self.load(id)
    }

    /// Returns a profile. Users may always read their own.
    pub fn get(&self, actor: &Actor, id: UserId) -> ServiceResult<UserProfile> {
        if id != actor.user_id {
            require_permission(actor, Permission::Users)?;
        }
        self.load(id)
    }

    pub fn list(&self, actor: &Actor, query: &UserListQuery) -> ServiceResult<Vec<UserProfile>> {
        require_permission(actor, Permission::Users)?;
        Ok(self.repo.list_users(query)?)
    }

    pub fn find_by_username(&self, username: &str) -> ServiceResult<Option<UserProfile>> {
        Ok(self.repo.find_user_by_username(username.trim())?)
    }

    /// Resolves an active user into an actor and stamps `last_login`.
    pub fn sign_in(&self, username: &str) -> ServiceResult<Actor> {
        let username = username.trim();
        let profile = self
            .repo
            .find_user_by_username(username)?
            .filter(|profile| profile.is_active)
            .ok_or_else(|| ServiceError::NotFound {
                entity: "active user",
                key: username.to_string(),
            })?;
        self.repo.record_login(profile.id)?;
        info!(
            "event=user_sign_in module=service status=ok id={} role={}",
            profile.id, profile.role
        );
        Ok(profile.actor())
    }

    fn load(&self, id: UserId) -> ServiceResult<UserProfile> {
        self.repo.get_user(id)?.ok_or_else(|| ServiceError::NotFound {
            entity: "user",
            key: id.to_string(),
        })
    }
}
