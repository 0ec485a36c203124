use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Delivery channel for out-of-band verification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationChannel {
    Email,
    Sms,
}

impl VerificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationChannel::Email => "email",
            VerificationChannel::Sms => "sms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(VerificationChannel::Email),
            "sms" => Some(VerificationChannel::Sms),
            _ => None,
        }
    }
}

/// A single verification code issued to a user. Only the SHA-256 hash of the
/// code is stored; the plaintext exists only in the delivered message.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub channel_code: String,
    pub destination_text: String,
    pub code_hash_text: String,
    pub expiry_utc: DateTime<Utc>,
    pub attempt_count: i32,
    pub attempt_max: i32,
    pub consumed_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(
        user_id: Uuid,
        channel: VerificationChannel,
        destination: String,
        code_hash: String,
        created_utc: DateTime<Utc>,
        expiry_utc: DateTime<Utc>,
        attempt_max: i32,
    ) -> Self {
        Self {
            token_id: Uuid::new_v4(),
            user_id,
            channel_code: channel.as_str().to_string(),
            destination_text: destination,
            code_hash_text: code_hash,
            expiry_utc,
            attempt_count: 0,
            attempt_max,
            consumed_utc: None,
            created_utc,
        }
    }

    pub fn channel(&self) -> Option<VerificationChannel> {
        VerificationChannel::parse(&self.channel_code)
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_utc.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_utc
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt_count >= self.attempt_max
    }
}

/// Outcome of sending a verification code.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub sent: bool,
    pub expires_in_seconds: i64,
}

/// Why a verification attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailReason {
    NotFound,
    Expired,
    TooManyAttempts,
    Mismatch,
    AlreadyUsed,
}

/// Outcome of a verification attempt. `reason` is populated only when
/// `valid` is false.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub valid: bool,
    pub reason: Option<VerifyFailReason>,
}

impl VerifyOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: VerifyFailReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}
