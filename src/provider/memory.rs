//! # In-Memory Providers
//!
//! Issuer and secret store that live entirely in process memory, with
//! switches to make individual operations fail. Used by the engine and
//! cycle tests, and handy for exercising a configuration without touching
//! Linode or Vault.

use super::{CredentialIssuer, SecretStore};
use crate::model::{Clock, Credential, CredentialId, RotationRecord, SecretValue, StorageTarget};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct IssuerFailures {
    find: bool,
    create: bool,
    list: bool,
    revoke: HashSet<CredentialId>,
}

/// Issuer backed by a `Vec` of credentials
#[derive(Debug)]
pub struct InMemoryIssuer {
    clock: Arc<dyn Clock>,
    next_id: AtomicUsize,
    credentials: Mutex<Vec<Credential>>,
    failures: Mutex<IssuerFailures>,
    create_calls: AtomicUsize,
    revoked: Mutex<Vec<CredentialId>>,
}

impl InMemoryIssuer {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_id: AtomicUsize::new(1000),
            credentials: Mutex::new(Vec::new()),
            failures: Mutex::new(IssuerFailures::default()),
            create_calls: AtomicUsize::new(0),
            revoked: Mutex::new(Vec::new()),
        }
    }

    /// Seed an existing credential. Its secret is dropped, as a real issuer would.
    pub fn insert(&self, mut credential: Credential) {
        credential.secret = None;
        lock(&self.credentials).push(credential);
    }

    /// Snapshot of every live credential
    #[must_use]
    pub fn credentials(&self) -> Vec<Credential> {
        lock(&self.credentials).clone()
    }

    #[must_use]
    pub fn credentials_with_label(&self, label: &str) -> Vec<Credential> {
        lock(&self.credentials)
            .iter()
            .filter(|c| c.label == label)
            .cloned()
            .collect()
    }

    /// Number of `create` calls, successful or not
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Identifiers successfully revoked, in call order
    #[must_use]
    pub fn revoked(&self) -> Vec<CredentialId> {
        lock(&self.revoked).clone()
    }

    pub fn fail_find(&self, fail: bool) {
        lock(&self.failures).find = fail;
    }

    pub fn fail_create(&self, fail: bool) {
        lock(&self.failures).create = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        lock(&self.failures).list = fail;
    }

    pub fn fail_revoke(&self, id: CredentialId) {
        lock(&self.failures).revoke.insert(id);
    }
}

#[async_trait]
impl CredentialIssuer for InMemoryIssuer {
    async fn find_by_label(&self, label: &str) -> Result<Vec<Credential>> {
        if lock(&self.failures).find {
            return Err(anyhow!("injected failure listing tokens for label {label}"));
        }
        Ok(self.credentials_with_label(label))
    }

    async fn create(
        &self,
        label: &str,
        scopes: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Credential> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failures).create {
            return Err(anyhow!("injected failure creating token {label}"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as CredentialId;
        let credential = Credential {
            id,
            label: label.to_string(),
            secret: Some(SecretValue::new(format!("tok-{id}-{label}"))),
            created_at: self.clock.now(),
            expires_at,
            scopes: scopes.to_string(),
        };
        self.insert(credential.clone());
        Ok(credential)
    }

    async fn revoke(&self, id: CredentialId) -> Result<()> {
        if lock(&self.failures).revoke.contains(&id) {
            return Err(anyhow!("injected failure revoking token {id}"));
        }
        let mut credentials = lock(&self.credentials);
        let before = credentials.len();
        credentials.retain(|c| c.id != id);
        if credentials.len() == before {
            return Err(anyhow!("token {id} not found"));
        }
        lock(&self.revoked).push(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Credential>> {
        if lock(&self.failures).list {
            return Err(anyhow!("injected failure listing tokens"));
        }
        Ok(self.credentials())
    }
}

/// Secret store backed by two hash maps keyed by target path
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<HashMap<String, SecretValue>>,
    records: Mutex<HashMap<String, RotationRecord>>,
    failing_secret_paths: Mutex<HashSet<String>>,
    fail_record_reads: AtomicBool,
    fail_record_writes: AtomicBool,
    secret_writes: AtomicUsize,
    record_writes: AtomicUsize,
}

impl InMemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn secret(&self, path: &str) -> Option<SecretValue> {
        lock(&self.secrets).get(path).cloned()
    }

    #[must_use]
    pub fn record(&self, path: &str) -> Option<RotationRecord> {
        lock(&self.records).get(path).cloned()
    }

    pub fn put_record(&self, path: &str, record: RotationRecord) {
        lock(&self.records).insert(path.to_string(), record);
    }

    /// Successful secret writes so far
    #[must_use]
    pub fn secret_writes(&self) -> usize {
        self.secret_writes.load(Ordering::SeqCst)
    }

    /// Successful record writes so far
    #[must_use]
    pub fn record_writes(&self) -> usize {
        self.record_writes.load(Ordering::SeqCst)
    }

    /// Make secret writes to `path` fail (or succeed again)
    pub fn fail_secret_writes_to(&self, path: &str, fail: bool) {
        let mut failing = lock(&self.failing_secret_paths);
        if fail {
            failing.insert(path.to_string());
        } else {
            failing.remove(path);
        }
    }

    pub fn fail_record_reads(&self, fail: bool) {
        self.fail_record_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_record_writes(&self, fail: bool) {
        self.fail_record_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn write_secret(&self, target: &StorageTarget, value: &SecretValue) -> Result<()> {
        if lock(&self.failing_secret_paths).contains(&target.path) {
            return Err(anyhow!("injected failure writing secret to {target}"));
        }
        lock(&self.secrets).insert(target.path.clone(), value.clone());
        self.secret_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_secret(&self, target: &StorageTarget) -> Result<Option<SecretValue>> {
        Ok(self.secret(&target.path))
    }

    async fn write_record(&self, target: &StorageTarget, record: &RotationRecord) -> Result<()> {
        if self.fail_record_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("injected failure writing record to {target}"));
        }
        lock(&self.records).insert(target.path.clone(), record.clone());
        self.record_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_record(&self, target: &StorageTarget) -> Result<Option<RotationRecord>> {
        if self.fail_record_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("injected failure reading record from {target}"));
        }
        Ok(self.record(&target.path))
    }
}
