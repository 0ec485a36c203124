//! Test helper module for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use authz_service::clock::ManualClock;
use authz_service::crypto::SecretCipher;
use authz_service::delivery::{MockEmailProvider, MockSmsProvider};
use authz_service::models::RoleAssignment;
use authz_service::registry::RoleRegistry;
use authz_service::services::VerificationPolicy;
use authz_service::store::{AuthzStore, MemoryStore};
use authz_service::AuthzCore;

/// Fixed start of time for all tests.
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub struct TestCore {
    pub core: AuthzCore,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub email: Arc<MockEmailProvider>,
    pub sms: Arc<MockSmsProvider>,
}

pub async fn setup() -> TestCore {
    setup_with_providers(true, true).await
}

pub async fn setup_with_providers(email_enabled: bool, sms_enabled: bool) -> TestCore {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(test_epoch()));
    let email = Arc::new(MockEmailProvider::new(email_enabled));
    let sms = Arc::new(MockSmsProvider::new(sms_enabled));

    let registry = Arc::new(RoleRegistry::load().unwrap());
    registry.initialize(store.as_ref()).await.unwrap();

    let cipher = Arc::new(SecretCipher::from_base64(&SecretCipher::generate_key()).unwrap());

    let core = AuthzCore::new(
        store.clone(),
        registry,
        cipher,
        email.clone(),
        sms.clone(),
        clock.clone(),
        "Grace Network".to_string(),
        VerificationPolicy::default(),
    );

    TestCore {
        core,
        store,
        clock,
        email,
        sms,
    }
}

impl TestCore {
    /// Inserts an assignment directly into the store, bypassing delegation
    /// checks. Used to bootstrap acting users.
    pub async fn seed_assignment(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role_name: &str,
    ) -> RoleAssignment {
        let assignment = RoleAssignment::new(
            user_id,
            tenant_id,
            role_name.to_string(),
            Uuid::new_v4(),
            test_epoch(),
        );
        self.store.upsert_assignment(&assignment).await.unwrap()
    }
}

/// Pulls the first 6-digit run out of a delivered message body.
pub fn extract_code(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if bytes[start].is_ascii_digit() {
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end - start == 6 {
                return text[start..end].to_string();
            }
            start = end;
        } else {
            start += 1;
        }
    }
    panic!("no 6-digit code found in: {}", text);
}
