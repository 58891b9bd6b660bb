//! # Rotation Cycle
//!
//! One pass over every configured policy, in declaration order. A failing
//! credential is logged and counted; it never stops the others. Cancellation
//! is checked between credentials, so work already handed to an adapter is
//! allowed to finish.
//!
//! After the policies, an optional pruning pass revokes expired credentials
//! whose label belongs to a managed policy. Credentials with any other label
//! are never touched.

use crate::model::CredentialPolicy;
use crate::rotation::{ProcessOutcome, RotationEngine, RotationEvent};
use std::collections::HashSet;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counts reported at the end of a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Policies handed to the engine, successful or not
    pub processed: usize,
    pub created: usize,
    pub rotated: usize,
    pub unchanged: usize,
    /// Dry-run evaluations that would have mutated something
    pub planned: usize,
    pub failed: usize,
    /// Policies never started because the cycle was cancelled
    pub skipped_cancelled: usize,
    pub revoked: usize,
}

impl CycleSummary {
    fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Unchanged { .. } => self.unchanged += 1,
            ProcessOutcome::Created { .. } => self.created += 1,
            ProcessOutcome::Rotated { .. } => self.rotated += 1,
            ProcessOutcome::DryRun(_) => self.planned += 1,
        }
    }
}

/// Run one rotation cycle over `policies`
pub async fn run_cycle(
    engine: &RotationEngine,
    policies: &[CredentialPolicy],
    prune: bool,
    cancel: &CancellationToken,
) -> CycleSummary {
    let started = Instant::now();
    let mut summary = CycleSummary::default();
    info!("Starting rotation cycle for {} tokens", policies.len());

    for (index, policy) in policies.iter().enumerate() {
        if cancel.is_cancelled() {
            summary.skipped_cancelled = policies.len() - index;
            warn!(
                "Cycle cancelled, skipping {} remaining tokens",
                summary.skipped_cancelled
            );
            break;
        }

        summary.processed += 1;
        match engine.process_credential(policy).await {
            Ok(outcome) => summary.record(&outcome),
            Err(e) => {
                summary.failed += 1;
                error!("Failed to process token {}: {}", policy.label, e);
            }
        }
    }

    if prune && !cancel.is_cancelled() {
        let managed: Vec<String> = policies.iter().map(|p| p.label.clone()).collect();
        summary.revoked = prune_expired(engine, &managed).await;
    }

    let duration = started.elapsed();
    engine.events().emit(&RotationEvent::CycleCompleted {
        processed: summary.processed,
        failed: summary.failed,
        duration,
    });
    info!(
        processed = summary.processed,
        created = summary.created,
        rotated = summary.rotated,
        unchanged = summary.unchanged,
        planned = summary.planned,
        failed = summary.failed,
        skipped = summary.skipped_cancelled,
        revoked = summary.revoked,
        "Rotation cycle finished in {:.2}s",
        duration.as_secs_f64()
    );
    summary
}

/// Revoke expired credentials whose label is in `managed_labels`.
///
/// Returns how many were revoked. Listing and revocation failures are
/// logged; in dry-run mode candidates are only logged.
pub async fn prune_expired(engine: &RotationEngine, managed_labels: &[String]) -> usize {
    info!("Pruning expired tokens");
    let all = match engine.issuer().list().await {
        Ok(all) => all,
        Err(e) => {
            error!("Failed to list tokens for pruning: {:#}", e);
            return 0;
        }
    };

    let managed: HashSet<&str> = managed_labels.iter().map(String::as_str).collect();
    let now = engine.clock().now();
    let mut revoked = 0;

    for credential in all
        .iter()
        .filter(|c| managed.contains(c.label.as_str()) && c.is_expired_at(now))
    {
        if engine.is_dry_run() {
            info!(
                "[dry-run] Would revoke expired token {} ({})",
                credential.label, credential.id
            );
            continue;
        }

        match engine.issuer().revoke(credential.id).await {
            Ok(()) => {
                revoked += 1;
                info!(
                    "Revoked expired token {} ({})",
                    credential.label, credential.id
                );
                engine.events().emit(&RotationEvent::Revoked {
                    label: credential.label.clone(),
                    credential_id: credential.id,
                });
            }
            Err(e) => {
                warn!(
                    "Failed to revoke token {} ({}): {:#}",
                    credential.label, credential.id, e
                );
                engine.events().emit(&RotationEvent::RevocationFailed {
                    label: credential.label.clone(),
                    credential_id: credential.id,
                });
            }
        }
    }

    debug!("Pruning revoked {} tokens", revoked);
    revoked
}
