use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::delivery::{EmailMessage, EmailProvider, ProviderError};

/// SMTP email delivery over STARTTLS.
pub struct SmtpEmailProvider {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpEmailProvider {
    pub fn new(config: SmtpConfig) -> Result<Self, ProviderError> {
        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let credentials = Credentials::new(config.user.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ProviderError::Configuration(format!("SMTP relay setup failed: {}", e)))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            ProviderError::NotEnabled("email delivery is disabled".to_string())
        })?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| ProviderError::Configuration(format!("invalid from address: {}", e)))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| ProviderError::InvalidRecipient(format!("{}: {}", message.to, e)))?;

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone());

        let email = match &message.body_html {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(message.body_text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            None => builder.body(message.body_text.clone()),
        }
        .map_err(|e| ProviderError::Configuration(format!("failed to build message: {}", e)))?;

        transport
            .send(email)
            .await
            .map_err(|e| ProviderError::SendFailed(e.to_string()))?;

        tracing::debug!(to = %message.to, "Email dispatched");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Captures messages instead of sending them.
pub struct MockEmailProvider {
    enabled: bool,
    fail_sends: AtomicBool,
    send_count: AtomicU64,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            fail_sends: AtomicBool::new(false),
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Makes subsequent sends fail while the provider stays enabled.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn last_message(&self) -> Option<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "email delivery is disabled".to_string(),
            ));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ProviderError::SendFailed("simulated send failure".to_string()));
        }
        self.send_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(to = %message.to, "[MOCK] Email captured");
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
