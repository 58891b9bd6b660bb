//! # Scheduler
//!
//! Drives rotation cycles. One-shot mode runs a single cycle; daemon mode
//! runs one immediately and then one per `check_interval` until cancelled.
//! Cancellation is cooperative: an in-flight cycle stops before its next
//! credential and the loop exits.

use crate::config::RunMode;
use crate::cycle::{run_cycle, CycleSummary};
use crate::model::CredentialPolicy;
use crate::rotation::RotationEngine;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Running totals over every cycle a scheduler ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub cycles: usize,
    /// Failed tokens summed across all cycles
    pub failed: usize,
    pub last: CycleSummary,
}

impl RunReport {
    fn record(&mut self, summary: CycleSummary) {
        self.cycles += 1;
        self.failed += summary.failed;
        self.last = summary;
    }
}

#[derive(Debug)]
pub struct Scheduler {
    engine: RotationEngine,
    policies: Vec<CredentialPolicy>,
    mode: RunMode,
    interval: Duration,
    prune_expired: bool,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        engine: RotationEngine,
        policies: Vec<CredentialPolicy>,
        mode: RunMode,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            policies,
            mode,
            interval,
            prune_expired: false,
        }
    }

    #[must_use]
    pub fn with_pruning(mut self, prune_expired: bool) -> Self {
        self.prune_expired = prune_expired;
        self
    }

    /// Run until the mode's work is done or `cancel` fires
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::default();
        match self.mode {
            RunMode::OneShot => {
                info!("Running a single rotation cycle");
                report.record(self.cycle(cancel).await);
            }
            RunMode::Daemon => self.run_daemon(cancel, &mut report).await,
        }
        report
    }

    async fn run_daemon(&self, cancel: &CancellationToken, report: &mut RunReport) {
        info!(
            "Starting daemon with check interval {}s",
            self.interval.as_secs()
        );
        report.record(self.cycle(cancel).await);

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    report.record(self.cycle(cancel).await);
                }
            }
        }
    }

    async fn cycle(&self, cancel: &CancellationToken) -> CycleSummary {
        run_cycle(&self.engine, &self.policies, self.prune_expired, cancel).await
    }
}
