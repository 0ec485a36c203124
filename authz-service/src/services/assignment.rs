//! Role assignment and delegation.
//!
//! Delegation authority comes solely from each role's `delegable_roles`
//! allow-list. Role levels play no part in the decision, so a high-level
//! role can still be barred from granting a lower-level one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::RoleAssignment;
use crate::registry::RoleRegistry;
use crate::store::AuthzStore;

/// Optional per-assignment fields.
#[derive(Debug, Default, Clone)]
pub struct AssignmentOptions {
    pub title: Option<String>,
    pub department: Option<String>,
    pub additional_permissions: Vec<String>,
    pub restricted_permissions: Vec<String>,
    pub expires_utc: Option<DateTime<Utc>>,
}

pub struct RoleAssignmentService {
    store: Arc<dyn AuthzStore>,
    registry: Arc<RoleRegistry>,
    clock: Arc<dyn Clock>,
}

impl RoleAssignmentService {
    pub fn new(store: Arc<dyn AuthzStore>, registry: Arc<RoleRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Grants `role_name` to a user within a tenant, replacing any role they
    /// already hold there. The grant is immediate; step-up enforcement, if
    /// any, is evaluated by the caller afterwards.
    #[tracing::instrument(skip(self, options), fields(actor_id = %actor_id, user_id = %user_id, tenant_id = %tenant_id, role_name = role_name))]
    pub async fn assign_role(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        tenant_id: Uuid,
        role_name: &str,
        options: AssignmentOptions,
    ) -> Result<RoleAssignment, AppError> {
        if self.registry.get_role(role_name).is_none() {
            return Err(AppError::ValidationError(format!(
                "unknown role: {}",
                role_name
            )));
        }
        for permission in options
            .additional_permissions
            .iter()
            .chain(options.restricted_permissions.iter())
        {
            if self.registry.get_permission(permission).is_none() {
                return Err(AppError::ValidationError(format!(
                    "unknown permission: {}",
                    permission
                )));
            }
        }

        if !self.can_manage_role(actor_id, tenant_id, role_name).await {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "not authorized to assign role '{}'",
                role_name
            )));
        }

        let mut assignment = RoleAssignment::new(
            user_id,
            tenant_id,
            role_name.to_string(),
            actor_id,
            self.clock.now(),
        );
        assignment.title = options.title;
        assignment.department = options.department;
        assignment.additional_permissions = options.additional_permissions;
        assignment.restricted_permissions = options.restricted_permissions;
        assignment.expires_utc = options.expires_utc;

        let stored = self.store.upsert_assignment(&assignment).await?;
        tracing::info!("Role assigned");
        Ok(stored)
    }

    /// Whether the actor may grant or revoke `role_name` within the tenant.
    /// Fails closed like permission resolution.
    pub async fn can_manage_role(&self, actor_id: Uuid, tenant_id: Uuid, role_name: &str) -> bool {
        match self.check_manage_role(actor_id, tenant_id, role_name).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(error = %e, "Delegation check failed, denying");
                false
            }
        }
    }

    async fn check_manage_role(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        role_name: &str,
    ) -> Result<bool, AppError> {
        if self.registry.get_role(role_name).is_none() {
            return Ok(false);
        }
        let now = self.clock.now();

        // An assignment held in the target tenant itself.
        if let Some(assignment) = self.store.find_active_assignment(actor_id, tenant_id).await? {
            if assignment.is_valid(now) {
                if let Some(role) = self.registry.get_role(&assignment.role_name) {
                    if role.can_delegate(role_name) {
                        return Ok(true);
                    }
                }
            }
        }

        // Otherwise only a cross-tenant scope held anywhere carries
        // authority into this tenant.
        for assignment in self.store.find_active_assignments_for_user(actor_id).await? {
            if assignment.tenant_id == tenant_id || !assignment.is_valid(now) {
                continue;
            }
            if let Some(role) = self.registry.get_role(&assignment.role_name) {
                if role.scope.is_cross_tenant() && role.can_delegate(role_name) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Deactivates the user's active assignment in the tenant. The actor must
    /// be able to manage the role currently held.
    #[tracing::instrument(skip(self), fields(actor_id = %actor_id, user_id = %user_id, tenant_id = %tenant_id))]
    pub async fn revoke_role(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<(), AppError> {
        let assignment = self
            .store
            .find_active_assignment(user_id, tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("no active role assignment for user in tenant"))
            })?;

        if !self
            .can_manage_role(actor_id, tenant_id, &assignment.role_name)
            .await
        {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "not authorized to revoke role '{}'",
                assignment.role_name
            )));
        }

        self.store.deactivate_assignment(user_id, tenant_id).await?;
        tracing::info!(role_name = %assignment.role_name, "Role revoked");
        Ok(())
    }

    pub async fn list_tenant_assignments(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, AppError> {
        self.store.list_active_assignments(tenant_id).await
    }
}
