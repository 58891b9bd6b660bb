//! # Credential Policies
//!
//! Declared intent for one managed label. Policies are loaded once from the
//! configuration (the `tokens:` list) and never mutated afterwards.

use crate::config::duration::parse_validity_duration;
use crate::config::ConfigError;
use crate::constants::MAX_VALIDITY_SECS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Secret store backend a token is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Vault,
}

/// Destination for a rotated token value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageTarget {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    /// Path relative to the secret store mount
    pub path: String,
}

impl StorageTarget {
    #[must_use]
    pub fn vault(path: impl Into<String>) -> Self {
        Self {
            kind: StorageKind::Vault,
            path: path.into(),
        }
    }
}

impl std::fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            StorageKind::Vault => write!(f, "vault:{}", self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CredentialPolicy {
    #[serde(default)]
    pub label: String,
    /// Owning team, carried as metadata only
    #[serde(default)]
    pub team: String,
    /// Validity string such as `90d` or `6mo`
    #[serde(default)]
    pub validity: String,
    #[serde(default)]
    pub scopes: String,
    /// Per-token threshold override; `0` falls back to the global default
    #[serde(default)]
    pub rotation_threshold: u8,
    #[serde(default)]
    pub storage: Vec<StorageTarget>,
}

impl CredentialPolicy {
    /// Policy-specific threshold when set and non-zero, else `default`
    #[must_use]
    pub fn effective_threshold(&self, default: u8) -> u8 {
        if self.rotation_threshold > 0 {
            self.rotation_threshold
        } else {
            default
        }
    }

    /// Parse the declared validity and enforce the issuance ceiling
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValidity`] when the string is malformed
    /// and [`ConfigError::ValidityTooLong`] when it exceeds
    /// [`MAX_VALIDITY_SECS`].
    pub fn validity_duration(&self) -> Result<Duration, ConfigError> {
        let validity = parse_validity_duration(&self.validity)?;
        if validity.as_secs() > MAX_VALIDITY_SECS {
            return Err(ConfigError::ValidityTooLong {
                value: self.validity.clone(),
                max_days: MAX_VALIDITY_SECS / 86_400,
            });
        }
        Ok(validity)
    }

    /// Target whose metadata holds the rotation record (the first one)
    #[must_use]
    pub fn record_target(&self) -> Option<&StorageTarget> {
        self.storage.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u8) -> CredentialPolicy {
        CredentialPolicy {
            label: "ci-deployer".to_string(),
            team: "platform".to_string(),
            validity: "90d".to_string(),
            scopes: "linodes:read_write".to_string(),
            rotation_threshold: threshold,
            storage: vec![
                StorageTarget::vault("ci/linode"),
                StorageTarget::vault("ci/linode-mirror"),
            ],
        }
    }

    #[test]
    fn test_effective_threshold_override() {
        assert_eq!(policy(25).effective_threshold(10), 25);
    }

    #[test]
    fn test_effective_threshold_zero_falls_back() {
        assert_eq!(policy(0).effective_threshold(10), 10);
    }

    #[test]
    fn test_record_target_is_first_storage() {
        let p = policy(0);
        assert_eq!(p.record_target().map(|t| t.path.as_str()), Some("ci/linode"));
    }

    #[test]
    fn test_validity_duration_enforces_ceiling() {
        let mut p = policy(0);
        p.validity = "180d".to_string();
        assert_eq!(p.validity_duration().unwrap(), Duration::from_secs(180 * 86_400));

        p.validity = "2000000000d".to_string();
        assert!(matches!(
            p.validity_duration(),
            Err(ConfigError::ValidityTooLong { max_days: 180, .. })
        ));
    }

    #[test]
    fn test_storage_target_deserialize() {
        let target: StorageTarget =
            serde_yaml::from_str("type: vault\npath: team/token").unwrap();
        assert_eq!(target, StorageTarget::vault("team/token"));
        assert_eq!(target.to_string(), "vault:team/token");
    }

    #[test]
    fn test_unknown_storage_kind_rejected() {
        let result: Result<StorageTarget, _> = serde_yaml::from_str("type: s3\npath: x");
        assert!(result.is_err());
    }
}
