use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Second-factor method a user has enrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorMethod {
    Authenticator,
    Email,
    Sms,
}

impl TwoFactorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwoFactorMethod::Authenticator => "authenticator",
            TwoFactorMethod::Email => "email",
            TwoFactorMethod::Sms => "sms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authenticator" => Some(TwoFactorMethod::Authenticator),
            "email" => Some(TwoFactorMethod::Email),
            "sms" => Some(TwoFactorMethod::Sms),
            _ => None,
        }
    }
}

/// Per-user two-factor state. `secret_enc_text` and every entry of
/// `backup_codes_enc` are AES-256-GCM ciphertexts, base64 encoded.
#[derive(Debug, Clone, FromRow)]
pub struct TwoFactorCredential {
    pub user_id: Uuid,
    pub enabled_flag: bool,
    pub method_code: Option<String>,
    pub secret_enc_text: Option<String>,
    pub backup_codes_enc: Vec<String>,
    pub enrolled_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl TwoFactorCredential {
    pub fn new(user_id: Uuid, created_utc: DateTime<Utc>) -> Self {
        Self {
            user_id,
            enabled_flag: false,
            method_code: None,
            secret_enc_text: None,
            backup_codes_enc: Vec::new(),
            enrolled_utc: None,
            created_utc,
            updated_utc: created_utc,
        }
    }

    pub fn method(&self) -> Option<TwoFactorMethod> {
        self.method_code.as_deref().and_then(TwoFactorMethod::parse)
    }
}

/// Result of a fresh TOTP setup. The secret and backup codes are returned in
/// plaintext exactly once; only ciphertext is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TotpSetup {
    pub secret: String,
    pub provisioning_uri: String,
    pub backup_codes: Vec<String>,
}
