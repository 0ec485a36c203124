//! Two-factor credential management: TOTP enrollment, code verification and
//! single-use backup codes. Secrets and backup codes are encrypted before
//! they touch the store and decrypted only transiently for comparison.

use std::sync::Arc;

use service_core::error::AppError;
use uuid::Uuid;

use crate::clock::Clock;
use crate::crypto::codes::{constant_time_eq, generate_backup_code};
use crate::crypto::totp;
use crate::crypto::SecretCipher;
use crate::models::{TotpSetup, TwoFactorCredential, TwoFactorMethod};
use crate::store::AuthzStore;

/// Backup codes issued per enrollment.
pub const BACKUP_CODE_COUNT: usize = 10;

/// Accepted clock drift, in 30-second steps on either side of now.
pub const DRIFT_WINDOW_STEPS: i64 = 2;

pub struct TwoFactorService {
    store: Arc<dyn AuthzStore>,
    cipher: Arc<SecretCipher>,
    clock: Arc<dyn Clock>,
    issuer: String,
}

impl TwoFactorService {
    pub fn new(
        store: Arc<dyn AuthzStore>,
        cipher: Arc<SecretCipher>,
        clock: Arc<dyn Clock>,
        issuer: String,
    ) -> Self {
        Self {
            store,
            cipher,
            clock,
            issuer,
        }
    }

    /// Provisions a fresh TOTP secret and backup codes for a user. Running it
    /// again rotates both; an already-enabled credential stays enabled. The
    /// returned plaintexts are shown to the user once and never stored.
    #[tracing::instrument(skip(self, account_label), fields(user_id = %user_id))]
    pub async fn setup_totp(
        &self,
        user_id: Uuid,
        account_label: &str,
    ) -> Result<TotpSetup, AppError> {
        let secret = totp::generate_secret();
        let provisioning_uri = totp::provisioning_uri(&secret, account_label, &self.issuer);
        let backup_codes: Vec<String> =
            (0..BACKUP_CODE_COUNT).map(|_| generate_backup_code()).collect();

        let mut encrypted_codes = Vec::with_capacity(backup_codes.len());
        for code in &backup_codes {
            encrypted_codes.push(self.cipher.encrypt_string(code)?);
        }

        let now = self.clock.now();
        let mut credential = match self.store.find_credential(user_id).await? {
            Some(existing) => existing,
            None => TwoFactorCredential::new(user_id, now),
        };
        credential.secret_enc_text = Some(self.cipher.encrypt_string(&secret)?);
        credential.backup_codes_enc = encrypted_codes;
        credential.updated_utc = now;
        self.store.put_credential(&credential).await?;

        tracing::info!("TOTP secret provisioned");
        Ok(TotpSetup {
            secret,
            provisioning_uri,
            backup_codes,
        })
    }

    /// Checks a TOTP code against the user's secret, accepting
    /// [`DRIFT_WINDOW_STEPS`] steps of drift. A user without a provisioned
    /// secret never verifies.
    pub async fn verify_totp(&self, user_id: Uuid, code: &str) -> Result<bool, AppError> {
        let credential = match self.store.find_credential(user_id).await? {
            Some(credential) => credential,
            None => return Ok(false),
        };
        let secret_enc = match &credential.secret_enc_text {
            Some(secret_enc) => secret_enc,
            None => return Ok(false),
        };

        let secret = self.cipher.decrypt_string(secret_enc)?;
        totp::verify_with_window(
            &secret,
            code,
            self.clock.now().timestamp(),
            DRIFT_WINDOW_STEPS,
        )
    }

    /// Redeems a backup code. Each code verifies at most once; the store
    /// removal is the single-winner step under concurrency.
    pub async fn verify_backup_code(&self, user_id: Uuid, code: &str) -> Result<bool, AppError> {
        let credential = match self.store.find_credential(user_id).await? {
            Some(credential) => credential,
            None => return Ok(false),
        };

        for stored_enc in &credential.backup_codes_enc {
            let stored = self.cipher.decrypt_string(stored_enc)?;
            if constant_time_eq(&stored, code) {
                let removed = self.store.remove_backup_code(user_id, stored_enc).await?;
                if removed {
                    tracing::info!(user_id = %user_id, "Backup code redeemed");
                }
                return Ok(removed);
            }
        }
        Ok(false)
    }

    /// Marks two-factor as enabled with the given method. Authenticator
    /// enrollment requires a previously provisioned secret; the out-of-band
    /// methods need no prior state.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, method = method.as_str()))]
    pub async fn enable_2fa(&self, user_id: Uuid, method: TwoFactorMethod) -> Result<(), AppError> {
        let now = self.clock.now();
        let credential = self.store.find_credential(user_id).await?;

        if method == TwoFactorMethod::Authenticator {
            let has_secret = credential
                .as_ref()
                .map(|c| c.secret_enc_text.is_some())
                .unwrap_or(false);
            if !has_secret {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "authenticator enrollment requires a provisioned secret"
                )));
            }
        } else if credential.is_none() {
            self.store
                .put_credential(&TwoFactorCredential::new(user_id, now))
                .await?;
        }

        let updated = self
            .store
            .enable_credential(user_id, method.as_str(), now)
            .await?;
        if !updated {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "two-factor credential not found"
            )));
        }

        tracing::info!("Two-factor enabled");
        Ok(())
    }

    /// Disables two-factor and wipes the enrollment, secret and backup codes
    /// included.
    pub async fn disable_2fa(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.store.disable_credential(user_id).await? {
            tracing::info!(user_id = %user_id, "Two-factor disabled");
        }
        Ok(())
    }

    pub async fn is_2fa_enabled(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .store
            .find_credential(user_id)
            .await?
            .map(|c| c.enabled_flag)
            .unwrap_or(false))
    }

    pub async fn get_2fa_method(&self, user_id: Uuid) -> Result<Option<TwoFactorMethod>, AppError> {
        Ok(self
            .store
            .find_credential(user_id)
            .await?
            .and_then(|c| c.method()))
    }

    /// Replaces all backup codes after re-proving control of the
    /// authenticator. Previously issued codes stop working.
    #[tracing::instrument(skip(self, totp_code), fields(user_id = %user_id))]
    pub async fn regenerate_backup_codes(
        &self,
        user_id: Uuid,
        totp_code: &str,
    ) -> Result<Vec<String>, AppError> {
        if !self.verify_totp(user_id, totp_code).await? {
            return Err(AppError::AuthError(anyhow::anyhow!(
                "authenticator code rejected"
            )));
        }

        let backup_codes: Vec<String> =
            (0..BACKUP_CODE_COUNT).map(|_| generate_backup_code()).collect();
        let mut encrypted_codes = Vec::with_capacity(backup_codes.len());
        for code in &backup_codes {
            encrypted_codes.push(self.cipher.encrypt_string(code)?);
        }

        let replaced = self
            .store
            .replace_backup_codes(user_id, &encrypted_codes)
            .await?;
        if !replaced {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "two-factor credential not found"
            )));
        }

        tracing::info!("Backup codes regenerated");
        Ok(backup_codes)
    }
}
