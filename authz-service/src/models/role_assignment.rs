use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's role within a tenant, plus per-user permission overlays. The
/// database enforces at most one active row per (user_id, tenant_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleAssignment {
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role_name: String,
    pub title: Option<String>,
    pub department: Option<String>,
    pub additional_permissions: Vec<String>,
    pub restricted_permissions: Vec<String>,
    pub assigned_by: Uuid,
    pub assigned_utc: DateTime<Utc>,
    pub expires_utc: Option<DateTime<Utc>>,
    pub active_flag: bool,
}

impl RoleAssignment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        tenant_id: Uuid,
        role_name: String,
        assigned_by: Uuid,
        assigned_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            assignment_id: Uuid::new_v4(),
            user_id,
            tenant_id,
            role_name,
            title: None,
            department: None,
            additional_permissions: Vec::new(),
            restricted_permissions: Vec::new(),
            assigned_by,
            assigned_utc,
            expires_utc: None,
            active_flag: true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_utc {
            Some(expiry) => now >= expiry,
            None => false,
        }
    }

    /// Active and not past its expiry.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active_flag && !self.is_expired(now)
    }
}
