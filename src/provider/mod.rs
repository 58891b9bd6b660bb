//! # Provider Modules
//!
//! Capability traits the rotation engine consumes, plus their adapters.
//!
//! - [`CredentialIssuer`]: mints, lists and revokes tokens (Linode)
//! - [`SecretStore`]: stores token values and rotation records (Vault KV v2)
//!
//! The in-memory adapters in [`memory`] implement both traits with failure
//! injection and back the engine's tests.

use crate::model::{Credential, CredentialId, RotationRecord, SecretValue, StorageTarget};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Provider trait for the service that issues expiring credentials
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// All credentials carrying `label`. More than one may exist while an
    /// outgoing credential waits for its natural expiry.
    async fn find_by_label(&self, label: &str) -> Result<Vec<Credential>>;

    /// Mint a credential. The returned value carries the secret; nothing else does.
    async fn create(
        &self,
        label: &str,
        scopes: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Credential>;

    async fn revoke(&self, id: CredentialId) -> Result<()>;

    /// Every credential visible to this account, managed or not
    async fn list(&self) -> Result<Vec<Credential>>;
}

/// Provider trait for the store holding token values and rotation records
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn write_secret(&self, target: &StorageTarget, value: &SecretValue) -> Result<()>;

    /// `None` when nothing has been stored at `target` yet
    async fn read_secret(&self, target: &StorageTarget) -> Result<Option<SecretValue>>;

    async fn write_record(&self, target: &StorageTarget, record: &RotationRecord) -> Result<()>;

    /// `None` means the label has never been handled by this tool
    async fn read_record(&self, target: &StorageTarget) -> Result<Option<RotationRecord>>;
}

pub mod linode;
pub mod memory;
pub mod vault;

pub use linode::LinodeIssuer;
pub use memory::{InMemoryIssuer, InMemorySecretStore};
pub use vault::VaultSecretStore;
