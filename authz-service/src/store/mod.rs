pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    Permission, Role, RoleAssignment, StepUpFlag, TwoFactorCredential, VerificationChannel,
    VerificationToken,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence boundary for the authorization core. Backed by PostgreSQL in
/// production and by [`MemoryStore`] in tests.
#[async_trait]
pub trait AuthzStore: Send + Sync {
    // Catalog
    async fn upsert_role(&self, role: &Role) -> Result<(), AppError>;
    async fn upsert_permission(&self, permission: &Permission) -> Result<(), AppError>;

    // Role assignments
    async fn find_active_assignment(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<RoleAssignment>, AppError>;
    async fn find_active_assignments_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, AppError>;
    /// Inserts a new active assignment, or updates the existing active row
    /// for the same (user, tenant) in place. Returns the stored row.
    async fn upsert_assignment(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<RoleAssignment, AppError>;
    async fn deactivate_assignment(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<bool, AppError>;
    async fn list_active_assignments(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, AppError>;

    // Two-factor credentials
    async fn find_credential(&self, user_id: Uuid)
        -> Result<Option<TwoFactorCredential>, AppError>;
    async fn put_credential(&self, credential: &TwoFactorCredential) -> Result<(), AppError>;
    async fn enable_credential(
        &self,
        user_id: Uuid,
        method_code: &str,
        enrolled_utc: DateTime<Utc>,
    ) -> Result<bool, AppError>;
    async fn disable_credential(&self, user_id: Uuid) -> Result<bool, AppError>;
    async fn replace_backup_codes(
        &self,
        user_id: Uuid,
        codes_enc: &[String],
    ) -> Result<bool, AppError>;
    /// Removes one backup code if it is still present. Returns false when the
    /// code was already removed, which makes concurrent redemption of the
    /// same code a single-winner race.
    async fn remove_backup_code(&self, user_id: Uuid, code_enc: &str) -> Result<bool, AppError>;

    // Verification tokens
    async fn insert_token(&self, token: &VerificationToken) -> Result<(), AppError>;
    /// The newest unconsumed token for a user and channel, expired or not.
    /// Expiry is judged by the caller against its clock.
    async fn find_latest_token(
        &self,
        user_id: Uuid,
        channel: VerificationChannel,
    ) -> Result<Option<VerificationToken>, AppError>;
    /// Bumps the attempt counter, refusing once the ceiling is reached or the
    /// token is consumed. Returns whether the bump happened.
    async fn increment_token_attempts(&self, token_id: Uuid) -> Result<bool, AppError>;
    /// Marks a token consumed. Returns false if it already was.
    async fn consume_token(&self, token_id: Uuid) -> Result<bool, AppError>;
    async fn count_recent_tokens(
        &self,
        user_id: Uuid,
        channel: VerificationChannel,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError>;
    async fn delete_token(&self, token_id: Uuid) -> Result<(), AppError>;
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    // Step-up flags
    async fn set_step_up_flag(&self, flag: &StepUpFlag) -> Result<(), AppError>;
    async fn get_step_up_flag(&self, user_id: Uuid) -> Result<Option<StepUpFlag>, AppError>;
    async fn clear_step_up_flag(&self, user_id: Uuid) -> Result<bool, AppError>;
}
