//! # Rotation Engine
//!
//! Decides, for one credential policy, whether to create, rotate, or leave
//! the credential alone, and drives the chosen path through mint-then-persist:
//!
//! 1. **Discover**: list the issuer's credentials carrying the policy label
//!    and pick the current one (latest creation time).
//! 2. **Evaluate**: none found means create; found and at or below the
//!    threshold (or expired) means rotate; otherwise nothing to do.
//! 3. **Mint**: read the prior rotation record, then ask the issuer for a new
//!    credential expiring `now + validity`.
//! 4. **Persist**: write the secret to every storage target, then write the
//!    rotation record whether or not storage succeeded. The new credential
//!    exists at the issuer and must always be recorded.
//!
//! The outgoing credential is never revoked here; it stays valid until its
//! own expiry so consumers holding the old value keep working.

pub mod error;
pub mod events;
pub mod outcome;

pub use error::{RotationError, StorageFailure};
pub use events::{EventSink, NoopEventSink, RecordingEventSink, RotationEvent};
pub use outcome::{PersistOutcome, PlannedAction, ProcessOutcome};

use crate::config::ConfigError;
use crate::model::{
    select_current, Clock, Credential, CredentialPolicy, RotationRecord, StorageTarget,
    ValidityWindow,
};
use crate::provider::{CredentialIssuer, SecretStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Per-credential rotation decision and reconciliation
#[derive(Clone)]
pub struct RotationEngine {
    issuer: Arc<dyn CredentialIssuer>,
    store: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    default_threshold: u8,
    dry_run: bool,
}

impl std::fmt::Debug for RotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationEngine")
            .field("default_threshold", &self.default_threshold)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl RotationEngine {
    #[must_use]
    pub fn new(
        issuer: Arc<dyn CredentialIssuer>,
        store: Arc<dyn SecretStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            issuer,
            store,
            clock,
            events,
            default_threshold: crate::constants::DEFAULT_THRESHOLD_PERCENT,
            dry_run: false,
        }
    }

    /// Threshold used by policies that do not set their own
    #[must_use]
    pub fn with_default_threshold(mut self, threshold_percent: u8) -> Self {
        self.default_threshold = threshold_percent;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn default_threshold(&self) -> u8 {
        self.default_threshold
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub(crate) fn issuer(&self) -> &dyn CredentialIssuer {
        self.issuer.as_ref()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    /// Evaluate one policy and create or rotate its credential if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`RotationError`] describing which phase failed. Errors
    /// raised after a successful mint carry the new credential's identifier.
    pub async fn process_credential(
        &self,
        policy: &CredentialPolicy,
    ) -> Result<ProcessOutcome, RotationError> {
        let span = info_span!(
            "rotation.process_credential",
            credential.label = %policy.label,
            credential.team = %policy.team
        );
        let started = Instant::now();

        let result = self.evaluate(policy).instrument(span).await;

        if let Err(e) = &result {
            self.events.emit(&RotationEvent::Failed {
                label: policy.label.clone(),
                kind: e.kind(),
            });
        }
        self.events.emit(&RotationEvent::Processed {
            label: policy.label.clone(),
            duration: started.elapsed(),
        });
        result
    }

    async fn evaluate(&self, policy: &CredentialPolicy) -> Result<ProcessOutcome, RotationError> {
        let label = policy.label.as_str();
        let validity = policy
            .validity_duration()
            .map_err(|source| RotationError::Configuration {
                label: label.to_string(),
                source,
            })?;
        let record_target = policy
            .record_target()
            .ok_or_else(|| RotationError::Configuration {
                label: label.to_string(),
                source: ConfigError::Invalid(format!("token {label} has no storage targets")),
            })?;
        let threshold = policy.effective_threshold(self.default_threshold);

        let found = self
            .issuer
            .find_by_label(label)
            .await
            .map_err(|source| RotationError::Issuer {
                label: label.to_string(),
                operation: "find",
                source,
            })?;
        if found.len() > 1 {
            debug!(
                "{} tokens share label {}; using the most recently created",
                found.len(),
                label
            );
        }

        let Some(current) = select_current(&found) else {
            info!("No token found for {}, creating one", label);
            return self.mint_and_persist(policy, validity, record_target, None).await;
        };

        let now = self.clock.now();
        let window = ValidityWindow::for_credential(current, validity);
        let percent_remaining = window.percent_remaining(now);
        self.events.emit(&RotationEvent::Evaluated {
            label: label.to_string(),
            seconds_remaining: window.seconds_remaining(now),
            percent_remaining,
        });

        if !window.needs_rotation(threshold, now) {
            debug!(
                "Token {} ({}) does not need rotation ({:.2}% validity remaining, threshold {}%)",
                label, current.id, percent_remaining, threshold
            );
            self.events.emit(&RotationEvent::Unchanged {
                label: label.to_string(),
            });
            return Ok(ProcessOutcome::Unchanged {
                credential_id: current.id,
                percent_remaining,
            });
        }

        info!(
            "Token {} ({}) needs rotation ({:.2}% validity remaining, threshold {}%)",
            label, current.id, percent_remaining, threshold
        );
        self.mint_and_persist(policy, validity, record_target, Some(current))
            .await
    }

    /// Creation path when `outgoing` is `None`, rotation path otherwise
    async fn mint_and_persist(
        &self,
        policy: &CredentialPolicy,
        validity: Duration,
        record_target: &StorageTarget,
        outgoing: Option<&Credential>,
    ) -> Result<ProcessOutcome, RotationError> {
        let label = policy.label.as_str();

        if self.dry_run {
            let action = match outgoing {
                Some(old) => {
                    info!("[dry-run] Would rotate token {} (replacing {})", label, old.id);
                    PlannedAction::Rotate {
                        outgoing_id: old.id,
                    }
                }
                None => {
                    info!("[dry-run] Would create token {}", label);
                    PlannedAction::Create
                }
            };
            return Ok(ProcessOutcome::DryRun(action));
        }

        let prior = self
            .store
            .read_record(record_target)
            .await
            .map_err(|source| RotationError::StateRead {
                label: label.to_string(),
                target: record_target.to_string(),
                source,
            })?;

        // Phase A: mint
        let out_of_range = |reason: String| RotationError::Configuration {
            label: label.to_string(),
            source: ConfigError::InvalidDuration {
                value: policy.validity.clone(),
                reason,
            },
        };
        let validity =
            chrono::Duration::from_std(validity).map_err(|e| out_of_range(e.to_string()))?;
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(validity)
            .ok_or_else(|| out_of_range("expiry out of range".to_string()))?;
        let minted = self
            .issuer
            .create(label, &policy.scopes, expires_at)
            .await
            .map_err(|source| RotationError::Issuer {
                label: label.to_string(),
                operation: "create",
                source,
            })?;
        info!(
            "Minted token {} with id {}, expires at {}",
            label, minted.id, minted.expires_at
        );
        if let Some(old) = outgoing {
            info!(
                "Previous token {} stays valid until {}",
                old.id, old.expires_at
            );
        }

        // Phase B: persist
        let failures = self.store_everywhere(policy, &minted).await;

        let now = self.clock.now();
        let record = match outgoing {
            Some(old) => RotationRecord::after_rotation(&minted, old, prior.as_ref(), now),
            None => RotationRecord::after_creation(&minted, prior.as_ref(), now),
        };
        let record_result = self.store.write_record(record_target, &record).await;
        if let Err(e) = &record_result {
            self.events.emit(&RotationEvent::RecordWriteFailed {
                label: label.to_string(),
                target: record_target.to_string(),
            });
            if failures.is_empty() {
                warn!(
                    "Token {} ({}) stored but rotation record write to {} failed: {:#}",
                    label, minted.id, record_target, e
                );
            } else {
                error!(
                    "Token {} ({}) is live at the issuer but neither stored nor recorded: {:#}",
                    label, minted.id, e
                );
            }
        }

        PersistOutcome::classify(failures, record_result).into_result(label, minted.id)?;

        let outcome = match outgoing {
            Some(old) => {
                self.events.emit(&RotationEvent::Rotated {
                    label: label.to_string(),
                    credential_id: minted.id,
                    previous_id: old.id,
                });
                info!(
                    "Rotated token {}: {} -> {} (rotation {})",
                    label, old.id, minted.id, record.rotation_count
                );
                ProcessOutcome::Rotated {
                    credential_id: minted.id,
                    previous_id: old.id,
                    rotation_count: record.rotation_count,
                }
            }
            None => {
                self.events.emit(&RotationEvent::Created {
                    label: label.to_string(),
                    credential_id: minted.id,
                });
                info!("Created token {} with id {}", label, minted.id);
                ProcessOutcome::Created {
                    credential_id: minted.id,
                    rotation_count: record.rotation_count,
                }
            }
        };
        Ok(outcome)
    }

    /// Write the minted secret to every target, collecting each failure
    async fn store_everywhere(
        &self,
        policy: &CredentialPolicy,
        minted: &Credential,
    ) -> Vec<StorageFailure> {
        let mut failures = Vec::new();
        let Some(secret) = minted.secret.as_ref() else {
            // Unreachable with a well-behaved issuer; every target counts as failed
            for target in &policy.storage {
                failures.push(StorageFailure {
                    target: target.to_string(),
                    error: anyhow::anyhow!("issuer returned no secret value for {}", minted.id),
                });
            }
            return failures;
        };

        for target in &policy.storage {
            match self.store.write_secret(target, secret).await {
                Ok(()) => info!("Stored token {} at {}", policy.label, target),
                Err(error) => {
                    warn!(
                        "Failed to store token {} at {}: {:#}",
                        policy.label, target, error
                    );
                    self.events.emit(&RotationEvent::StorageWriteFailed {
                        label: policy.label.clone(),
                        target: target.to_string(),
                    });
                    failures.push(StorageFailure {
                        target: target.to_string(),
                        error,
                    });
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FixedClock, SecretValue};
    use crate::provider::{InMemoryIssuer, InMemorySecretStore};
    use chrono::{DateTime, TimeZone, Utc};

    struct Harness {
        clock: Arc<FixedClock>,
        issuer: Arc<InMemoryIssuer>,
        store: Arc<InMemorySecretStore>,
        events: Arc<RecordingEventSink>,
        engine: RotationEngine,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let clock = Arc::new(FixedClock::new(start()));
        let issuer = Arc::new(InMemoryIssuer::new(Arc::clone(&clock) as Arc<dyn Clock>));
        let store = Arc::new(InMemorySecretStore::new());
        let events = Arc::new(RecordingEventSink::new());
        let engine = RotationEngine::new(
            Arc::clone(&issuer) as Arc<dyn CredentialIssuer>,
            Arc::clone(&store) as Arc<dyn SecretStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&events) as Arc<dyn EventSink>,
        );
        Harness {
            clock,
            issuer,
            store,
            events,
            engine,
        }
    }

    fn policy() -> CredentialPolicy {
        CredentialPolicy {
            label: "t1".to_string(),
            team: "platform".to_string(),
            validity: "90d".to_string(),
            scopes: "*".to_string(),
            rotation_threshold: 0,
            storage: vec![StorageTarget::vault("apps/t1")],
        }
    }

    #[tokio::test]
    async fn test_invalid_validity_fails_before_issuer_call() {
        let h = harness();
        h.issuer.fail_find(true);
        let mut bad = policy();
        bad.validity = "ninety days".to_string();

        let err = h.engine.process_credential(&bad).await.unwrap_err();
        assert!(matches!(err, RotationError::Configuration { .. }));
        assert_eq!(h.issuer.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_validity_beyond_ceiling_fails_before_issuer_call() {
        let h = harness();
        let mut big = policy();
        big.validity = "2000000000d".to_string();

        let err = h.engine.process_credential(&big).await.unwrap_err();
        assert!(matches!(
            err,
            RotationError::Configuration {
                source: ConfigError::ValidityTooLong { .. },
                ..
            }
        ));
        assert_eq!(h.issuer.create_calls(), 0);
        assert_eq!(h.store.record_writes(), 0);
    }

    #[tokio::test]
    async fn test_find_failure_stops_processing() {
        let h = harness();
        h.issuer.fail_find(true);
        let err = h.engine.process_credential(&policy()).await.unwrap_err();
        assert!(matches!(err, RotationError::Issuer { operation: "find", .. }));
        assert_eq!(h.issuer.create_calls(), 0);
        assert_eq!(h.store.record_writes(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_writes_nothing() {
        let h = harness();
        h.issuer.fail_create(true);
        let err = h.engine.process_credential(&policy()).await.unwrap_err();
        assert!(matches!(err, RotationError::Issuer { operation: "create", .. }));
        assert_eq!(h.store.secret_writes(), 0);
        assert_eq!(h.store.record_writes(), 0);
    }

    #[tokio::test]
    async fn test_record_read_failure_aborts_before_mint() {
        let h = harness();
        h.store.fail_record_reads(true);
        let err = h.engine.process_credential(&policy()).await.unwrap_err();
        assert!(matches!(err, RotationError::StateRead { .. }));
        assert_eq!(h.issuer.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_creation_sets_expiry_from_validity() {
        let h = harness();
        let outcome = h.engine.process_credential(&policy()).await.unwrap();
        let ProcessOutcome::Created { credential_id, rotation_count } = outcome else {
            panic!("expected creation, got {outcome:?}");
        };
        assert_eq!(rotation_count, 0);

        let created = h.issuer.credentials_with_label("t1");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].id, credential_id);
        assert_eq!(created[0].expires_at, start() + chrono::Duration::days(90));

        let stored = h.store.secret("apps/t1").unwrap();
        assert_eq!(stored.expose(), format!("tok-{credential_id}-t1"));
        assert_eq!(
            h.events.count(|e| matches!(e, RotationEvent::Created { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_policy_threshold_overrides_default() {
        let h = harness();
        h.engine.process_credential(&policy()).await.unwrap();
        // 40 of 90 days left, about 44%
        h.clock.advance(chrono::Duration::days(50));

        let outcome = h.engine.process_credential(&policy()).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Unchanged { .. }));

        let mut eager = policy();
        eager.rotation_threshold = 50;
        let outcome = h.engine.process_credential(&eager).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Rotated { .. }));
    }

    #[tokio::test]
    async fn test_expired_token_rotates_even_with_zero_threshold() {
        let h = harness();
        let engine = h.engine.clone().with_default_threshold(0);
        h.issuer.insert(Credential {
            id: 1,
            label: "t1".to_string(),
            secret: Some(SecretValue::new("old")),
            created_at: start() - chrono::Duration::days(100),
            expires_at: start() - chrono::Duration::days(10),
            scopes: "*".to_string(),
        });

        let outcome = engine.process_credential(&policy()).await.unwrap();
        assert!(matches!(
            outcome,
            ProcessOutcome::Rotated { previous_id: 1, rotation_count: 1, .. }
        ));
        // The outgoing token is left for pruning, never revoked by rotation
        assert!(h.issuer.revoked().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_reads_but_never_mutates() {
        let h = harness();
        let engine = h.engine.clone().with_dry_run(true);

        let outcome = engine.process_credential(&policy()).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::DryRun(PlannedAction::Create));
        assert_eq!(h.issuer.create_calls(), 0);
        assert_eq!(h.store.record_writes(), 0);
    }

    #[tokio::test]
    async fn test_stored_but_record_write_failed() {
        let h = harness();
        h.store.fail_record_writes(true);

        let err = h.engine.process_credential(&policy()).await.unwrap_err();
        let RotationError::RecordWrite { credential_id, .. } = err else {
            panic!("expected record write error, got {err:?}");
        };
        assert!(h.store.secret("apps/t1").is_some());
        assert_eq!(h.issuer.credentials()[0].id, credential_id);
        assert_eq!(
            h.events.count(|e| matches!(e, RotationEvent::Failed { kind: "record_write", .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_every_target_is_attempted() {
        let h = harness();
        let mut multi = policy();
        multi.storage = vec![
            StorageTarget::vault("apps/a"),
            StorageTarget::vault("apps/b"),
            StorageTarget::vault("apps/c"),
        ];
        h.store.fail_secret_writes_to("apps/a", true);

        let err = h.engine.process_credential(&multi).await.unwrap_err();
        let RotationError::Storage { failures, .. } = err else {
            panic!("expected storage error, got {err:?}");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].target, "vault:apps/a");
        assert!(h.store.secret("apps/b").is_some());
        assert!(h.store.secret("apps/c").is_some());
        // Record lives with the first target even though its secret write failed
        assert!(h.store.record("apps/a").is_some());
    }
}
