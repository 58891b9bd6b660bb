//! Outcomes of processing one credential.

use super::error::{RotationError, StorageFailure};
use crate::model::CredentialId;

/// What a successful `process_credential` call did
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// A current credential exists and is above its threshold
    Unchanged {
        credential_id: CredentialId,
        percent_remaining: f64,
    },
    /// No credential carried the label; one was minted and stored
    Created {
        credential_id: CredentialId,
        rotation_count: u64,
    },
    /// A replacement was minted and stored; the outgoing one stays alive
    Rotated {
        credential_id: CredentialId,
        previous_id: CredentialId,
        rotation_count: u64,
    },
    /// Dry run: the action that would have been taken
    DryRun(PlannedAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Rotate { outgoing_id: CredentialId },
}

/// Result of the persist phase after a successful mint.
///
/// Each variant is a distinct terminal state; [`PersistOutcome::into_result`]
/// maps it onto the caller-visible result.
#[derive(Debug)]
pub enum PersistOutcome {
    CreatedAndStored,
    CreatedStoredRecordFailed(anyhow::Error),
    CreatedNotStoredRecordUpdated(Vec<StorageFailure>),
    CreatedNotStoredRecordFailed {
        failures: Vec<StorageFailure>,
        record_error: anyhow::Error,
    },
}

impl PersistOutcome {
    /// Classify the storage failures and the record write result
    #[must_use]
    pub fn classify(failures: Vec<StorageFailure>, record: anyhow::Result<()>) -> Self {
        match (failures.is_empty(), record) {
            (true, Ok(())) => Self::CreatedAndStored,
            (true, Err(e)) => Self::CreatedStoredRecordFailed(e),
            (false, Ok(())) => Self::CreatedNotStoredRecordUpdated(failures),
            (false, Err(record_error)) => Self::CreatedNotStoredRecordFailed {
                failures,
                record_error,
            },
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::CreatedAndStored)
    }

    /// # Errors
    ///
    /// Every variant except [`PersistOutcome::CreatedAndStored`] maps to a
    /// [`RotationError`] naming the minted credential.
    pub fn into_result(self, label: &str, credential_id: CredentialId) -> Result<(), RotationError> {
        let label = label.to_string();
        match self {
            Self::CreatedAndStored => Ok(()),
            Self::CreatedStoredRecordFailed(source) => Err(RotationError::RecordWrite {
                label,
                credential_id,
                source,
            }),
            Self::CreatedNotStoredRecordUpdated(failures) => Err(RotationError::Storage {
                label,
                credential_id,
                failures,
            }),
            Self::CreatedNotStoredRecordFailed {
                failures,
                record_error,
            } => Err(RotationError::RecordLost {
                label,
                credential_id,
                failures,
                record_error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn failure() -> Vec<StorageFailure> {
        vec![StorageFailure {
            target: "vault:a".to_string(),
            error: anyhow!("denied"),
        }]
    }

    #[test]
    fn test_classify_covers_every_state() {
        assert!(PersistOutcome::classify(Vec::new(), Ok(())).is_complete());

        let outcome = PersistOutcome::classify(Vec::new(), Err(anyhow!("sealed")));
        assert!(matches!(
            outcome.into_result("t1", 5),
            Err(RotationError::RecordWrite { credential_id: 5, .. })
        ));

        let outcome = PersistOutcome::classify(failure(), Ok(()));
        assert!(matches!(
            outcome.into_result("t1", 5),
            Err(RotationError::Storage { .. })
        ));

        let outcome = PersistOutcome::classify(failure(), Err(anyhow!("sealed")));
        let err = outcome.into_result("t1", 5).unwrap_err();
        assert_eq!(err.kind(), "record_lost");
        assert_eq!(err.minted_id(), Some(5));
    }
}
