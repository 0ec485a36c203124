//! Out-of-band verification codes over email and SMS.
//!
//! Codes are short-lived, hashed at rest, rate limited per user and channel,
//! and burn out after a fixed number of wrong attempts. Once the attempt
//! ceiling is reached a submission is rejected before any comparison runs,
//! so the correct code cannot be brute-forced on the final try.

use std::sync::Arc;

use service_core::error::AppError;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::clock::Clock;
use crate::crypto::codes::{constant_time_eq, generate_numeric_code, hash_code};
use crate::delivery::{EmailMessage, EmailProvider, SmsMessage, SmsProvider};
use crate::models::{SendOutcome, VerificationChannel, VerificationToken, VerifyFailReason, VerifyOutcome};
use crate::store::AuthzStore;

/// Digits per verification code.
pub const CODE_LENGTH: usize = 6;

/// Issuance and verification limits.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    pub code_ttl: chrono::Duration,
    pub max_attempts: i32,
    pub send_limit: i64,
    pub send_window: chrono::Duration,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            code_ttl: chrono::Duration::minutes(10),
            max_attempts: 3,
            send_limit: 3,
            send_window: chrono::Duration::minutes(15),
        }
    }
}

pub struct VerificationService {
    store: Arc<dyn AuthzStore>,
    email: Arc<dyn EmailProvider>,
    sms: Arc<dyn SmsProvider>,
    clock: Arc<dyn Clock>,
    policy: VerificationPolicy,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn AuthzStore>,
        email: Arc<dyn EmailProvider>,
        sms: Arc<dyn SmsProvider>,
        clock: Arc<dyn Clock>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            store,
            email,
            sms,
            clock,
            policy,
        }
    }

    /// Issues a fresh code and delivers it over the requested channel. The
    /// token is written before delivery and removed again if delivery fails.
    #[tracing::instrument(skip(self, destination), fields(user_id = %user_id, channel = channel.as_str()))]
    pub async fn send_code(
        &self,
        user_id: Uuid,
        destination: &str,
        channel: VerificationChannel,
    ) -> Result<SendOutcome, AppError> {
        validate_destination(destination, channel)?;

        let enabled = match channel {
            VerificationChannel::Email => self.email.is_enabled(),
            VerificationChannel::Sms => self.sms.is_enabled(),
        };
        if !enabled {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "{} delivery is not configured",
                channel.as_str()
            )));
        }

        let now = self.clock.now();
        let since = now - self.policy.send_window;
        let recent = self.store.count_recent_tokens(user_id, channel, since).await?;
        if recent >= self.policy.send_limit {
            return Err(AppError::TooManyRequests(
                "Too many verification codes requested. Please try again later.".to_string(),
                Some(self.policy.send_window.num_seconds() as u64),
            ));
        }

        let code = generate_numeric_code(CODE_LENGTH);
        let token = VerificationToken::new(
            user_id,
            channel,
            destination.to_string(),
            hash_code(&code),
            now,
            now + self.policy.code_ttl,
            self.policy.max_attempts,
        );
        self.store.insert_token(&token).await?;

        let ttl_minutes = self.policy.code_ttl.num_minutes();
        let delivery = match channel {
            VerificationChannel::Email => {
                let message = EmailMessage {
                    to: destination.to_string(),
                    subject: "Your verification code".to_string(),
                    body_text: format!(
                        "Your verification code is {}. It expires in {} minutes.",
                        code, ttl_minutes
                    ),
                    body_html: None,
                };
                self.email.send(&message).await
            }
            VerificationChannel::Sms => {
                let message = SmsMessage {
                    to: destination.to_string(),
                    body: format!("{} is your verification code. It expires in {} minutes.", code, ttl_minutes),
                };
                self.sms.send(&message).await
            }
        };

        if let Err(send_err) = delivery {
            if let Err(delete_err) = self.store.delete_token(token.token_id).await {
                tracing::warn!(error = %delete_err, "Failed to remove undelivered verification token");
            }
            return Err(match channel {
                VerificationChannel::Email => AppError::EmailError(send_err.to_string()),
                VerificationChannel::Sms => AppError::SmsError(send_err.to_string()),
            });
        }

        // Never log the code itself.
        tracing::info!("Verification code sent");
        Ok(SendOutcome {
            sent: true,
            expires_in_seconds: self.policy.code_ttl.num_seconds(),
        })
    }

    /// Checks a submitted code against the newest outstanding token for the
    /// user and channel. A matching code is consumed and cannot verify a
    /// second time.
    #[tracing::instrument(skip(self, code), fields(user_id = %user_id, channel = channel.as_str()))]
    pub async fn verify_code(
        &self,
        user_id: Uuid,
        code: &str,
        channel: VerificationChannel,
    ) -> Result<VerifyOutcome, AppError> {
        let token = match self.store.find_latest_token(user_id, channel).await? {
            Some(token) => token,
            None => return Ok(VerifyOutcome::invalid(VerifyFailReason::NotFound)),
        };

        if token.is_expired(self.clock.now()) {
            return Ok(VerifyOutcome::invalid(VerifyFailReason::Expired));
        }
        if token.attempts_exhausted() {
            return Ok(VerifyOutcome::invalid(VerifyFailReason::TooManyAttempts));
        }
        // The guarded increment rechecks the ceiling, closing the window
        // between the read above and concurrent attempts.
        if !self.store.increment_token_attempts(token.token_id).await? {
            return Ok(VerifyOutcome::invalid(VerifyFailReason::TooManyAttempts));
        }

        if !constant_time_eq(&hash_code(code), &token.code_hash_text) {
            return Ok(VerifyOutcome::invalid(VerifyFailReason::Mismatch));
        }

        if !self.store.consume_token(token.token_id).await? {
            return Ok(VerifyOutcome::invalid(VerifyFailReason::AlreadyUsed));
        }

        tracing::info!("Verification code accepted");
        Ok(VerifyOutcome::valid())
    }

    /// Removes every token past its expiry. Returns how many were deleted.
    pub async fn cleanup_expired(&self) -> Result<u64, AppError> {
        self.store.delete_expired_tokens(self.clock.now()).await
    }

    /// Spawns the periodic expiry sweep.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        every: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match service.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::info!(removed, "Expired verification codes swept")
                    }
                    Err(e) => tracing::warn!(error = %e, "Verification sweep failed"),
                }
            }
        })
    }
}

fn validate_destination(destination: &str, channel: VerificationChannel) -> Result<(), AppError> {
    match channel {
        VerificationChannel::Email => {
            if !destination.contains('@') || !destination.contains('.') {
                return Err(AppError::ValidationError(
                    "Invalid email address".to_string(),
                ));
            }
        }
        VerificationChannel::Sms => {
            if !destination.starts_with('+') || destination.len() < 10 {
                return Err(AppError::ValidationError(
                    "Invalid phone number. Use E.164 format (+1234567890)".to_string(),
                ));
            }
        }
    }
    Ok(())
}
