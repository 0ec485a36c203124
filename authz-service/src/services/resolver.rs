//! Permission resolution.
//!
//! Effective permissions are `(role permissions UNION additional) MINUS
//! restricted`. A restriction beats any grant of the same permission, and
//! every failure path resolves to "denied" rather than an error so callers
//! can gate actions on a plain boolean.

use std::sync::Arc;

use service_core::error::AppError;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::UserRoleView;
use crate::registry::RoleRegistry;
use crate::store::AuthzStore;

pub struct PermissionResolver {
    store: Arc<dyn AuthzStore>,
    registry: Arc<RoleRegistry>,
    clock: Arc<dyn Clock>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn AuthzStore>, registry: Arc<RoleRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Whether a user holds a permission within a tenant. Fails closed: any
    /// storage or catalog problem denies instead of erroring.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, tenant_id = %tenant_id, permission = permission))]
    pub async fn has_permission(&self, user_id: Uuid, tenant_id: Uuid, permission: &str) -> bool {
        match self.resolve(user_id, tenant_id, permission).await {
            Ok(granted) => granted,
            Err(e) => {
                tracing::warn!(error = %e, "Permission check failed, denying");
                false
            }
        }
    }

    async fn resolve(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        permission: &str,
    ) -> Result<bool, AppError> {
        let assignment = match self.store.find_active_assignment(user_id, tenant_id).await? {
            Some(assignment) => assignment,
            None => return Ok(false),
        };

        if assignment.is_expired(self.clock.now()) {
            return Ok(false);
        }

        let role = match self.registry.get_role(&assignment.role_name) {
            Some(role) => role,
            None => {
                // A stored role that is no longer in the catalog grants
                // nothing, not even the per-assignment extras.
                tracing::warn!(
                    role_name = %assignment.role_name,
                    "Assignment references a role missing from the catalog, denying"
                );
                return Ok(false);
            }
        };

        if assignment.restricted_permissions.iter().any(|p| p == permission) {
            return Ok(false);
        }

        Ok(role.grants(permission)
            || assignment.additional_permissions.iter().any(|p| p == permission))
    }

    /// The user's effective role in a tenant, or None when no valid
    /// assignment exists.
    pub async fn get_user_role(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<UserRoleView>, AppError> {
        let assignment = match self.store.find_active_assignment(user_id, tenant_id).await? {
            Some(assignment) => assignment,
            None => return Ok(None),
        };

        if assignment.is_expired(self.clock.now()) {
            return Ok(None);
        }

        let role = match self.registry.get_role(&assignment.role_name) {
            Some(role) => role,
            None => {
                tracing::warn!(
                    role_name = %assignment.role_name,
                    "Assignment references a role missing from the catalog"
                );
                return Ok(None);
            }
        };

        let mut permissions: Vec<String> = role.permissions.iter().cloned().collect();
        permissions.sort();

        Ok(Some(UserRoleView {
            role_name: role.name.clone(),
            display_name: role.display_name.clone(),
            level: role.level,
            scope: role.scope,
            permissions,
            additional_permissions: assignment.additional_permissions.clone(),
            restricted_permissions: assignment.restricted_permissions.clone(),
            title: assignment.title.clone(),
            department: assignment.department.clone(),
            assigned_utc: assignment.assigned_utc,
            expires_utc: assignment.expires_utc,
        }))
    }
}
