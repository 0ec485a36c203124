//! Multi-tenant authorization core: role catalog, permission resolution,
//! delegated role assignment, two-factor credentials, out-of-band
//! verification codes and step-up enforcement.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod delivery;
pub mod models;
pub mod registry;
pub mod services;
pub mod store;

use std::sync::Arc;

use service_core::error::AppError;
use uuid::Uuid;

use crate::clock::Clock;
use crate::crypto::SecretCipher;
use crate::delivery::{EmailProvider, SmsProvider};
use crate::models::{RoleAssignment, StepUpOutcome};
use crate::registry::RoleRegistry;
use crate::services::{
    AssignmentOptions, PermissionResolver, RoleAssignmentService, StepUpService, TwoFactorService,
    VerificationPolicy, VerificationService,
};
use crate::store::AuthzStore;

/// The assembled authorization core. Fields are the individual services;
/// methods exist only where an operation spans more than one of them.
pub struct AuthzCore {
    pub registry: Arc<RoleRegistry>,
    pub resolver: PermissionResolver,
    pub assignments: RoleAssignmentService,
    pub two_factor: TwoFactorService,
    pub verification: Arc<VerificationService>,
    pub step_up: StepUpService,
    store: Arc<dyn AuthzStore>,
    clock: Arc<dyn Clock>,
}

impl AuthzCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn AuthzStore>,
        registry: Arc<RoleRegistry>,
        cipher: Arc<SecretCipher>,
        email: Arc<dyn EmailProvider>,
        sms: Arc<dyn SmsProvider>,
        clock: Arc<dyn Clock>,
        totp_issuer: String,
        verification_policy: VerificationPolicy,
    ) -> Self {
        Self {
            resolver: PermissionResolver::new(store.clone(), registry.clone(), clock.clone()),
            assignments: RoleAssignmentService::new(store.clone(), registry.clone(), clock.clone()),
            two_factor: TwoFactorService::new(store.clone(), cipher, clock.clone(), totp_issuer),
            verification: Arc::new(VerificationService::new(
                store.clone(),
                email,
                sms,
                clock.clone(),
                verification_policy,
            )),
            step_up: StepUpService::new(store.clone(), registry.clone(), clock.clone()),
            registry,
            store,
            clock,
        }
    }

    /// Assigns a role and then evaluates step-up enforcement for the change.
    /// The grant is never blocked; a privileged grant to a user without
    /// two-factor simply comes back with `requires_2fa_setup` set.
    pub async fn assign_role(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        tenant_id: Uuid,
        role_name: &str,
        options: AssignmentOptions,
    ) -> Result<(RoleAssignment, StepUpOutcome), AppError> {
        let now = self.clock.now();
        let previous_role = self
            .store
            .find_active_assignment(user_id, tenant_id)
            .await?
            .filter(|a| a.is_valid(now))
            .map(|a| a.role_name);

        let assignment = self
            .assignments
            .assign_role(actor_id, user_id, tenant_id, role_name, options)
            .await?;

        let step_up = self
            .step_up
            .handle_role_upgrade(user_id, tenant_id, previous_role.as_deref(), role_name)
            .await?;

        Ok((assignment, step_up))
    }
}
