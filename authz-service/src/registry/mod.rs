//! Validated in-memory role and permission catalog.
//!
//! The registry is built once at startup. Construction fails on any
//! malformed catalog (duplicate names, references to undefined roles or
//! permissions) so a bad catalog can never serve permission checks.

pub mod catalog;

use std::collections::{HashMap, HashSet};

use service_core::error::AppError;

use crate::models::{Permission, Role};
use crate::store::AuthzStore;

pub struct RoleRegistry {
    roles: HashMap<String, Role>,
    permissions: HashMap<String, Permission>,
    privileged: HashSet<String>,
}

impl RoleRegistry {
    /// Builds the registry from the built-in catalog.
    pub fn load() -> Result<Self, AppError> {
        Self::from_catalog(
            catalog::builtin_roles(),
            catalog::builtin_permissions(),
            catalog::privileged_role_names(),
        )
    }

    fn from_catalog(
        roles: Vec<Role>,
        permissions: Vec<Permission>,
        privileged: HashSet<String>,
    ) -> Result<Self, AppError> {
        let mut permission_map: HashMap<String, Permission> = HashMap::new();
        for permission in permissions {
            if permission_map
                .insert(permission.name.clone(), permission)
                .is_some()
            {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "role catalog defines a duplicate permission"
                )));
            }
        }

        let role_names: HashSet<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        if role_names.len() != roles.len() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "role catalog defines a duplicate role"
            )));
        }

        for role in &roles {
            for permission in &role.permissions {
                if !permission_map.contains_key(permission) {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "role '{}' references undefined permission '{}'",
                        role.name,
                        permission
                    )));
                }
            }
            for delegable in &role.delegable_roles {
                if !role_names.contains(delegable.as_str()) {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "role '{}' delegates undefined role '{}'",
                        role.name,
                        delegable
                    )));
                }
            }
            for toggleable in &role.toggleable_permissions {
                if !role.permissions.contains(toggleable) {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "role '{}' marks '{}' toggleable but does not grant it",
                        role.name,
                        toggleable
                    )));
                }
            }
        }

        for name in &privileged {
            if !role_names.contains(name.as_str()) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "privileged role '{}' is not defined in the catalog",
                    name
                )));
            }
        }

        let role_map = roles.into_iter().map(|r| (r.name.clone(), r)).collect();
        Ok(Self {
            roles: role_map,
            permissions: permission_map,
            privileged,
        })
    }

    /// Seeds the catalog into the store. Upserts throughout, so running it on
    /// every boot is safe.
    pub async fn initialize(&self, store: &dyn AuthzStore) -> Result<(), AppError> {
        for permission in self.all_permissions() {
            store.upsert_permission(permission).await?;
        }
        for role in self.all_roles() {
            store.upsert_role(role).await?;
        }
        tracing::info!(
            roles = self.roles.len(),
            permissions = self.permissions.len(),
            "Role catalog seeded"
        );
        Ok(())
    }

    pub fn get_role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn get_permission(&self, name: &str) -> Option<&Permission> {
        self.permissions.get(name)
    }

    /// Every role, highest level first.
    pub fn all_roles(&self) -> Vec<&Role> {
        let mut roles: Vec<&Role> = self.roles.values().collect();
        roles.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.name.cmp(&b.name)));
        roles
    }

    pub fn all_permissions(&self) -> Vec<&Permission> {
        let mut permissions: Vec<&Permission> = self.permissions.values().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        permissions
    }

    pub fn is_privileged(&self, role_name: &str) -> bool {
        self.privileged.contains(role_name)
    }
}

// ==================== Tests ====================
