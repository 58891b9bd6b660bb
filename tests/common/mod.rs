//! Common test utilities for rotation integration tests
//!
//! Wires a [`RotationEngine`] to the in-memory issuer and secret store with
//! a fixed clock, so every test controls time and failures directly.

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use api_token_rotator::model::{
    Clock, Credential, CredentialId, CredentialPolicy, FixedClock, SecretValue, StorageTarget,
};
use api_token_rotator::provider::{
    CredentialIssuer, InMemoryIssuer, InMemorySecretStore, SecretStore,
};
use api_token_rotator::rotation::{EventSink, RecordingEventSink, RotationEngine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub issuer: Arc<InMemoryIssuer>,
    pub store: Arc<InMemorySecretStore>,
    pub events: Arc<RecordingEventSink>,
    pub engine: RotationEngine,
}

/// Fixed starting instant for every harness
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(epoch()));
        let issuer = Arc::new(InMemoryIssuer::new(Arc::clone(&clock) as Arc<dyn Clock>));
        let store = Arc::new(InMemorySecretStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let engine = RotationEngine::new(
            Arc::clone(&issuer) as Arc<dyn CredentialIssuer>,
            Arc::clone(&store) as Arc<dyn SecretStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&events) as Arc<dyn EventSink>,
        )
        .with_default_threshold(10);

        Self {
            clock,
            issuer,
            store,
            events,
            engine,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Seed an existing token created `age` ago with the given validity
    pub fn seed(&self, id: CredentialId, label: &str, age: Duration, validity: Duration) {
        let created_at = self.now() - age;
        self.issuer.insert(Credential {
            id,
            label: label.to_string(),
            secret: Some(SecretValue::new(format!("seeded-{id}"))),
            created_at,
            expires_at: created_at + validity,
            scopes: "*".to_string(),
        });
    }
}

pub fn policy(label: &str, validity: &str, threshold: u8) -> CredentialPolicy {
    CredentialPolicy {
        label: label.to_string(),
        team: "platform".to_string(),
        validity: validity.to_string(),
        scopes: "*".to_string(),
        rotation_threshold: threshold,
        storage: vec![StorageTarget::vault(format!("apps/{label}"))],
    }
}
