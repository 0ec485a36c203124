//! Outbound delivery channels for verification codes.

pub mod email;
pub mod sms;

use async_trait::async_trait;
use thiserror::Error;

pub use email::{MockEmailProvider, SmtpEmailProvider};
pub use sms::{HttpSmsProvider, MockSmsProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Provider configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError>;
    fn is_enabled(&self) -> bool;
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, message: &SmsMessage) -> Result<(), ProviderError>;
    fn is_enabled(&self) -> bool;
}
