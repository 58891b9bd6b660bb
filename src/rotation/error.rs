//! Rotation error kinds.
//!
//! Every error names the credential label it belongs to. Errors raised after
//! a successful mint also carry the new issuer identifier so an operator can
//! find the live token.

use crate::config::ConfigError;
use crate::model::CredentialId;
use thiserror::Error;

/// A storage target that rejected the new secret value
#[derive(Debug)]
pub struct StorageFailure {
    pub target: String,
    pub error: anyhow::Error,
}

impl std::fmt::Display for StorageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:#}", self.target, self.error)
    }
}

fn describe_failures(failures: &[StorageFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum RotationError {
    /// The policy cannot be acted on; no issuer call was made
    #[error("invalid policy for {label}: {source}")]
    Configuration { label: String, source: ConfigError },

    /// The prior rotation record could not be read; nothing was minted
    #[error("failed to read rotation record for {label} from {target}: {source:#}")]
    StateRead {
        label: String,
        target: String,
        source: anyhow::Error,
    },

    #[error("failed to {operation} token {label}: {source:#}")]
    Issuer {
        label: String,
        operation: &'static str,
        source: anyhow::Error,
    },

    /// Minted and recorded, but at least one target is missing the value
    #[error(
        "token {credential_id} for {label} was minted and recorded but not stored: {}",
        describe_failures(.failures)
    )]
    Storage {
        label: String,
        credential_id: CredentialId,
        failures: Vec<StorageFailure>,
    },

    /// Minted and stored everywhere, but the rotation record is stale
    #[error("token {credential_id} for {label} was stored but the rotation record write failed: {source:#}")]
    RecordWrite {
        label: String,
        credential_id: CredentialId,
        source: anyhow::Error,
    },

    /// Minted, not stored, and not recorded: only the issuer knows it exists
    #[error(
        "token {credential_id} for {label} was minted but neither stored ({}) nor recorded ({record_error:#})",
        describe_failures(.failures)
    )]
    RecordLost {
        label: String,
        credential_id: CredentialId,
        failures: Vec<StorageFailure>,
        record_error: anyhow::Error,
    },
}

impl RotationError {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Configuration { label, .. }
            | Self::StateRead { label, .. }
            | Self::Issuer { label, .. }
            | Self::Storage { label, .. }
            | Self::RecordWrite { label, .. }
            | Self::RecordLost { label, .. } => label,
        }
    }

    /// Stable name of the error kind, used as a metric label
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::StateRead { .. } => "state_read",
            Self::Issuer { .. } => "issuer",
            Self::Storage { .. } => "storage",
            Self::RecordWrite { .. } => "record_write",
            Self::RecordLost { .. } => "record_lost",
        }
    }

    /// Identifier of a token that exists at the issuer despite the error
    #[must_use]
    pub fn minted_id(&self) -> Option<CredentialId> {
        match self {
            Self::Storage { credential_id, .. }
            | Self::RecordWrite { credential_id, .. }
            | Self::RecordLost { credential_id, .. } => Some(*credential_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_storage_error_lists_every_target() {
        let err = RotationError::Storage {
            label: "t1".to_string(),
            credential_id: 7,
            failures: vec![
                StorageFailure {
                    target: "vault:a".to_string(),
                    error: anyhow!("denied"),
                },
                StorageFailure {
                    target: "vault:b".to_string(),
                    error: anyhow!("timeout"),
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("vault:a: denied"), "{rendered}");
        assert!(rendered.contains("vault:b: timeout"), "{rendered}");
        assert_eq!(err.kind(), "storage");
        assert_eq!(err.minted_id(), Some(7));
        assert_eq!(err.label(), "t1");
    }

    #[test]
    fn test_issuer_error_has_no_minted_id() {
        let err = RotationError::Issuer {
            label: "t1".to_string(),
            operation: "create",
            source: anyhow!("HTTP 500"),
        };
        assert_eq!(err.to_string(), "failed to create token t1: HTTP 500");
        assert!(err.minted_id().is_none());
    }
}
