//! In-memory store for tests. Mirrors the guarded-update semantics of the
//! PostgreSQL implementation, including the single-winner behavior of
//! attempt increments, token consumption and backup-code removal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    Permission, Role, RoleAssignment, StepUpFlag, TwoFactorCredential, VerificationChannel,
    VerificationToken,
};
use crate::store::AuthzStore;

#[derive(Default)]
struct Inner {
    roles: HashMap<String, Role>,
    permissions: HashMap<String, Permission>,
    assignments: Vec<RoleAssignment>,
    credentials: HashMap<Uuid, TwoFactorCredential>,
    tokens: Vec<VerificationToken>,
    flags: HashMap<Uuid, StepUpFlag>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail, for exercising fail-closed
    /// behavior in callers.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "simulated store failure"
            )));
        }
        self.inner
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("store mutex poisoned")))
    }
}

#[async_trait]
impl AuthzStore for MemoryStore {
    // ==================== Catalog Operations ====================

    async fn upsert_role(&self, role: &Role) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.roles.insert(role.name.clone(), role.clone());
        Ok(())
    }

    async fn upsert_permission(&self, permission: &Permission) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner
            .permissions
            .insert(permission.name.clone(), permission.clone());
        Ok(())
    }

    // ==================== Role Assignment Operations ====================

    async fn find_active_assignment(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<RoleAssignment>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .assignments
            .iter()
            .find(|a| a.user_id == user_id && a.tenant_id == tenant_id && a.active_flag)
            .cloned())
    }

    async fn find_active_assignments_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.active_flag)
            .cloned()
            .collect())
    }

    async fn upsert_assignment(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<RoleAssignment, AppError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner
            .assignments
            .iter_mut()
            .find(|a| {
                a.user_id == assignment.user_id
                    && a.tenant_id == assignment.tenant_id
                    && a.active_flag
            })
        {
            // Matches the ON CONFLICT DO UPDATE path: the row keeps its id.
            existing.role_name = assignment.role_name.clone();
            existing.title = assignment.title.clone();
            existing.department = assignment.department.clone();
            existing.additional_permissions = assignment.additional_permissions.clone();
            existing.restricted_permissions = assignment.restricted_permissions.clone();
            existing.assigned_by = assignment.assigned_by;
            existing.assigned_utc = assignment.assigned_utc;
            existing.expires_utc = assignment.expires_utc;
            return Ok(existing.clone());
        }

        let mut stored = assignment.clone();
        stored.active_flag = true;
        inner.assignments.push(stored.clone());
        Ok(stored)
    }

    async fn deactivate_assignment(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner
            .assignments
            .iter_mut()
            .find(|a| a.user_id == user_id && a.tenant_id == tenant_id && a.active_flag)
        {
            Some(assignment) => {
                assignment.active_flag = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_active_assignments(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .assignments
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.active_flag)
            .cloned()
            .collect())
    }

    // ==================== Two-Factor Operations ====================

    async fn find_credential(
        &self,
        user_id: Uuid,
    ) -> Result<Option<TwoFactorCredential>, AppError> {
        let inner = self.lock()?;
        Ok(inner.credentials.get(&user_id).cloned())
    }

    async fn put_credential(&self, credential: &TwoFactorCredential) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner
            .credentials
            .insert(credential.user_id, credential.clone());
        Ok(())
    }

    async fn enable_credential(
        &self,
        user_id: Uuid,
        method_code: &str,
        enrolled_utc: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.credentials.get_mut(&user_id) {
            Some(credential) => {
                credential.enabled_flag = true;
                credential.method_code = Some(method_code.to_string());
                credential.enrolled_utc = Some(enrolled_utc);
                credential.updated_utc = enrolled_utc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn disable_credential(&self, user_id: Uuid) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.credentials.get_mut(&user_id) {
            Some(credential) => {
                credential.enabled_flag = false;
                credential.method_code = None;
                credential.secret_enc_text = None;
                credential.backup_codes_enc.clear();
                credential.enrolled_utc = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_backup_codes(
        &self,
        user_id: Uuid,
        codes_enc: &[String],
    ) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.credentials.get_mut(&user_id) {
            Some(credential) => {
                credential.backup_codes_enc = codes_enc.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_backup_code(&self, user_id: Uuid, code_enc: &str) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.credentials.get_mut(&user_id) {
            Some(credential) if credential.backup_codes_enc.iter().any(|c| c == code_enc) => {
                credential.backup_codes_enc.retain(|c| c != code_enc);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ==================== Verification Token Operations ====================

    async fn insert_token(&self, token: &VerificationToken) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.tokens.push(token.clone());
        Ok(())
    }

    async fn find_latest_token(
        &self,
        user_id: Uuid,
        channel: VerificationChannel,
    ) -> Result<Option<VerificationToken>, AppError> {
        let inner = self.lock()?;
        // Later inserts win, matching ORDER BY created_utc DESC even when a
        // pinned test clock issues identical timestamps.
        Ok(inner
            .tokens
            .iter()
            .rev()
            .find(|t| {
                t.user_id == user_id
                    && t.channel_code == channel.as_str()
                    && t.consumed_utc.is_none()
            })
            .cloned())
    }

    async fn increment_token_attempts(&self, token_id: Uuid) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.tokens.iter_mut().find(|t| t.token_id == token_id) {
            Some(token) if token.consumed_utc.is_none() && token.attempt_count < token.attempt_max => {
                token.attempt_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_token(&self, token_id: Uuid) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.tokens.iter_mut().find(|t| t.token_id == token_id) {
            Some(token) if token.consumed_utc.is_none() => {
                token.consumed_utc = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_recent_tokens(
        &self,
        user_id: Uuid,
        channel: VerificationChannel,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .tokens
            .iter()
            .filter(|t| {
                t.user_id == user_id
                    && t.channel_code == channel.as_str()
                    && t.created_utc > since
            })
            .count() as i64)
    }

    async fn delete_token(&self, token_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.tokens.retain(|t| t.token_id != token_id);
        Ok(())
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut inner = self.lock()?;
        let before = inner.tokens.len();
        inner.tokens.retain(|t| t.expiry_utc >= now);
        Ok((before - inner.tokens.len()) as u64)
    }

    // ==================== Step-Up Flag Operations ====================

    async fn set_step_up_flag(&self, flag: &StepUpFlag) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.flags.insert(flag.user_id, flag.clone());
        Ok(())
    }

    async fn get_step_up_flag(&self, user_id: Uuid) -> Result<Option<StepUpFlag>, AppError> {
        let inner = self.lock()?;
        Ok(inner.flags.get(&user_id).cloned())
    }

    async fn clear_step_up_flag(&self, user_id: Uuid) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        Ok(inner.flags.remove(&user_id).is_some())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn token(user_id: Uuid, attempt_max: i32) -> VerificationToken {
        VerificationToken::new(
            user_id,
            VerificationChannel::Email,
            "user@example.org".to_string(),
            "hash".to_string(),
            Utc::now(),
            Utc::now() + chrono::Duration::minutes(10),
            attempt_max,
        )
    }

    #[tokio::test]
    async fn test_upsert_assignment_replaces_active_row() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let first = RoleAssignment::new(user_id, tenant_id, "member".to_string(), actor, Utc::now());
        let stored = store.upsert_assignment(&first).await.unwrap();

        let second =
            RoleAssignment::new(user_id, tenant_id, "volunteer".to_string(), actor, Utc::now());
        let replaced = store.upsert_assignment(&second).await.unwrap();

        assert_eq!(replaced.assignment_id, stored.assignment_id);
        assert_eq!(replaced.role_name, "volunteer");

        let active = store.find_active_assignments_for_user(user_id).await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_increment_stops_at_ceiling() {
        let store = MemoryStore::new();
        let t = token(Uuid::new_v4(), 2);
        store.insert_token(&t).await.unwrap();

        assert!(store.increment_token_attempts(t.token_id).await.unwrap());
        assert!(store.increment_token_attempts(t.token_id).await.unwrap());
        assert!(!store.increment_token_attempts(t.token_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_is_single_winner() {
        let store = MemoryStore::new();
        let t = token(Uuid::new_v4(), 3);
        store.insert_token(&t).await.unwrap();

        assert!(store.consume_token(t.token_id).await.unwrap());
        assert!(!store.consume_token(t.token_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_token_is_newest_unconsumed() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        let older = token(user_id, 3);
        let newer = token(user_id, 3);
        store.insert_token(&older).await.unwrap();
        store.insert_token(&newer).await.unwrap();

        let found = store
            .find_latest_token(user_id, VerificationChannel::Email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.token_id, newer.token_id);

        store.consume_token(newer.token_id).await.unwrap();
        let found = store
            .find_latest_token(user_id, VerificationChannel::Email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.token_id, older.token_id);
    }

    #[tokio::test]
    async fn test_remove_backup_code_single_winner() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let mut credential = TwoFactorCredential::new(user_id, Utc::now());
        credential.backup_codes_enc = vec!["enc-a".to_string(), "enc-b".to_string()];
        store.put_credential(&credential).await.unwrap();

        assert!(store.remove_backup_code(user_id, "enc-a").await.unwrap());
        assert!(!store.remove_backup_code(user_id, "enc-a").await.unwrap());
        assert!(store.remove_backup_code(user_id, "enc-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_expired_tokens() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        let mut expired = token(user_id, 3);
        expired.expiry_utc = Utc::now() - chrono::Duration::minutes(1);
        let live = token(user_id, 3);
        store.insert_token(&expired).await.unwrap();
        store.insert_token(&live).await.unwrap();

        let removed = store.delete_expired_tokens(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        let found = store
            .find_latest_token(user_id, VerificationChannel::Email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.token_id, live.token_id);
    }

    #[tokio::test]
    async fn test_fail_mode_errors_every_operation() {
        let store = MemoryStore::new();
        store.set_fail(true);
        assert!(store
            .find_active_assignment(Uuid::new_v4(), Uuid::new_v4())
            .await
            .is_err());
    }
}
