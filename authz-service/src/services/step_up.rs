//! Step-up enforcement for privileged roles.
//!
//! Granting a privileged role to a user without two-factor enrolled flags
//! the account as PENDING_STEP_UP instead of blocking the grant. The flag
//! clears only through completed enrollment.

use std::sync::Arc;

use service_core::error::AppError;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{StepUpCheck, StepUpFlag, StepUpOutcome, StepUpState};
use crate::registry::RoleRegistry;
use crate::store::AuthzStore;

pub struct StepUpService {
    store: Arc<dyn AuthzStore>,
    registry: Arc<RoleRegistry>,
    clock: Arc<dyn Clock>,
}

impl StepUpService {
    pub fn new(store: Arc<dyn AuthzStore>, registry: Arc<RoleRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Evaluates a completed role change. Flags the user when the change is
    /// an elevation into privileged territory and no second factor is
    /// enrolled.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, tenant_id = %tenant_id, new_role = new_role))]
    pub async fn handle_role_upgrade(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        previous_role: Option<&str>,
        new_role: &str,
    ) -> Result<StepUpOutcome, AppError> {
        if !self.registry.is_privileged(new_role) {
            return Ok(StepUpOutcome {
                requires_2fa_setup: false,
            });
        }
        if previous_role.is_some_and(|role| self.registry.is_privileged(role)) {
            // Already inside privileged territory, nothing new to enforce.
            return Ok(StepUpOutcome {
                requires_2fa_setup: false,
            });
        }
        if self.is_enrolled(user_id).await? {
            return Ok(StepUpOutcome {
                requires_2fa_setup: false,
            });
        }

        let flag = StepUpFlag::new(user_id, tenant_id, new_role.to_string(), self.clock.now());
        self.store.set_step_up_flag(&flag).await?;
        tracing::info!("Privileged role granted without second factor, step-up required");
        Ok(StepUpOutcome {
            requires_2fa_setup: true,
        })
    }

    /// Clears the pending flag once two-factor enrollment has actually
    /// completed. Refuses while enrollment is still missing.
    pub async fn complete_two_factor_setup(&self, user_id: Uuid) -> Result<(), AppError> {
        if !self.is_enrolled(user_id).await? {
            return Err(AppError::StepUpRequired(
                "two-factor enrollment is not complete".to_string(),
            ));
        }

        if self.store.clear_step_up_flag(user_id).await? {
            tracing::info!(user_id = %user_id, "Step-up completed");
        }
        Ok(())
    }

    /// Pre-flight check for a prospective grant: privileged roles are only
    /// cleanly assignable to users with a second factor already enrolled.
    pub async fn validate_role_assignment(
        &self,
        user_id: Uuid,
        role_name: &str,
    ) -> Result<StepUpCheck, AppError> {
        if self.registry.get_role(role_name).is_none() {
            return Err(AppError::ValidationError(format!(
                "unknown role: {}",
                role_name
            )));
        }

        if self.registry.is_privileged(role_name) && !self.is_enrolled(user_id).await? {
            return Ok(StepUpCheck {
                valid: false,
                requires_2fa_first: true,
            });
        }
        Ok(StepUpCheck {
            valid: true,
            requires_2fa_first: false,
        })
    }

    pub async fn step_up_state(&self, user_id: Uuid) -> Result<StepUpState, AppError> {
        Ok(match self.store.get_step_up_flag(user_id).await? {
            Some(_) => StepUpState::PendingStepUp,
            None => StepUpState::Normal,
        })
    }

    async fn is_enrolled(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .store
            .find_credential(user_id)
            .await?
            .map(|c| c.enabled_flag)
            .unwrap_or(false))
    }
}
