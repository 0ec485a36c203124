use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Security posture of a user account with respect to step-up enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepUpState {
    Normal,
    PendingStepUp,
}

impl StepUpState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepUpState::Normal => "normal",
            StepUpState::PendingStepUp => "pending_step_up",
        }
    }
}

/// Marker that a user was elevated to a privileged role without two-factor
/// enrolled. Cleared once enrollment completes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StepUpFlag {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role_name: String,
    pub created_utc: DateTime<Utc>,
}

impl StepUpFlag {
    pub fn new(user_id: Uuid, tenant_id: Uuid, role_name: String, created_utc: DateTime<Utc>) -> Self {
        Self {
            user_id,
            tenant_id,
            role_name,
            created_utc,
        }
    }
}

/// Result of granting a role: whether the grantee must now enroll a second
/// factor before their elevated access is considered settled.
#[derive(Debug, Clone, Serialize)]
pub struct StepUpOutcome {
    pub requires_2fa_setup: bool,
}

/// Result of a pre-flight check before granting a role.
#[derive(Debug, Clone, Serialize)]
pub struct StepUpCheck {
    pub valid: bool,
    pub requires_2fa_first: bool,
}
