use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::SmsConfig;
use crate::delivery::{ProviderError, SmsMessage, SmsProvider};

#[derive(Serialize)]
struct GatewayRequest<'a> {
    sender: &'a str,
    to: &'a str,
    body: &'a str,
}

/// SMS delivery through an HTTP gateway authenticated with an API key
/// header.
pub struct HttpSmsProvider {
    config: SmsConfig,
    client: reqwest::Client,
}

impl HttpSmsProvider {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn normalize_phone(phone: &str) -> String {
        phone
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect()
    }
}

#[async_trait]
impl SmsProvider for HttpSmsProvider {
    async fn send(&self, message: &SmsMessage) -> Result<(), ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::NotEnabled(
                "sms delivery is disabled".to_string(),
            ));
        }

        let to = Self::normalize_phone(&message.to);
        if to.is_empty() {
            return Err(ProviderError::InvalidRecipient(message.to.clone()));
        }

        let request = GatewayRequest {
            sender: &self.config.sender,
            to: &to,
            body: &message.body,
        };

        let response = self
            .client
            .post(&self.config.gateway_url)
            .header("authkey", &self.config.auth_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(format!(
                "gateway throttled send to {}",
                to
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "gateway returned {}: {}",
                status, body
            )));
        }

        tracing::debug!(to = %to, "SMS dispatched");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Captures messages instead of sending them.
pub struct MockSmsProvider {
    enabled: bool,
    fail_sends: AtomicBool,
    send_count: AtomicU64,
    sent: Mutex<Vec<SmsMessage>>,
}

impl MockSmsProvider {
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

    pub fn last_message(&self) -> Option<SmsMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl SmsProvider for MockSmsProvider {
    async fn send(&self, message: &SmsMessage) -> Result<(), ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "sms delivery is disabled".to_string(),
            ));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ProviderError::SendFailed("simulated send failure".to_string()));
        }
        self.send_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(to = %message.to, "[MOCK] SMS captured");
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
