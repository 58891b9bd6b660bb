//! # Metrics
//!
//! Prometheus metrics for monitoring token rotation.
//!
//! ## Metrics Exposed
//!
//! - `token_rotator_cycles_total` - Total number of rotation cycles
//! - `token_rotator_cycle_duration_seconds` - Duration of rotation cycles
//! - `token_rotator_tokens_processed_total` - Tokens evaluated by the engine
//! - `token_rotator_token_failures_total` - Token processing failures by error kind
//! - `token_rotator_rotations_total` - Creations and rotations by label and result
//! - `token_rotator_rotation_duration_seconds` - Duration of per-token processing
//! - `token_rotator_validity_remaining_seconds` - Seconds until the current token expires
//! - `token_rotator_storage_errors_total` - Failed secret or record writes by target
//! - `token_rotator_revocations_total` - Expired tokens revoked by pruning, by result
//!
//! Metrics are only updated through [`PrometheusEventSink`]; the engine
//! itself never touches this module.

use crate::rotation::{EventSink, RotationEvent};
use anyhow::Result;
use prometheus::{
    Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry,
};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static CYCLES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("token_rotator_cycles_total", "Total number of rotation cycles")
        .expect("Failed to create CYCLES_TOTAL metric - this should never happen")
});

static CYCLE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "token_rotator_cycle_duration_seconds",
            "Duration of rotation cycles in seconds",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
    )
    .expect("Failed to create CYCLE_DURATION metric - this should never happen")
});

static LAST_CYCLE_FAILURES: LazyLock<Gauge> = LazyLock::new(|| {
    Gauge::new(
        "token_rotator_last_cycle_failures",
        "Number of tokens that failed in the most recent cycle",
    )
    .expect("Failed to create LAST_CYCLE_FAILURES metric - this should never happen")
});

static TOKENS_PROCESSED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "token_rotator_tokens_processed_total",
        "Total number of tokens evaluated",
    )
    .expect("Failed to create TOKENS_PROCESSED_TOTAL metric - this should never happen")
});

static TOKEN_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "token_rotator_token_failures_total",
            "Total number of token processing failures by error kind",
        ),
        &["label", "kind"],
    )
    .expect("Failed to create TOKEN_FAILURES_TOTAL metric - this should never happen")
});

static ROTATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "token_rotator_rotations_total",
            "Total number of token creations and rotations by result",
        ),
        &["label", "result"],
    )
    .expect("Failed to create ROTATIONS_TOTAL metric - this should never happen")
});

static ROTATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "token_rotator_rotation_duration_seconds",
            "Duration of per-token processing in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["label"],
    )
    .expect("Failed to create ROTATION_DURATION metric - this should never happen")
});

static VALIDITY_REMAINING: LazyLock<GaugeVec> = LazyLock::new(|| {
    GaugeVec::new(
        Opts::new(
            "token_rotator_validity_remaining_seconds",
            "Seconds until the current token for a label expires",
        ),
        &["label"],
    )
    .expect("Failed to create VALIDITY_REMAINING metric - this should never happen")
});

static STORAGE_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "token_rotator_storage_errors_total",
            "Total number of failed secret or record writes by target",
        ),
        &["target", "kind"],
    )
    .expect("Failed to create STORAGE_ERRORS_TOTAL metric - this should never happen")
});

static REVOCATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "token_rotator_revocations_total",
            "Total number of expired token revocations by result",
        ),
        &["label", "result"],
    )
    .expect("Failed to create REVOCATIONS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
/// Register every metric with [`REGISTRY`]. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(CYCLES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CYCLE_DURATION.clone()))?;
    REGISTRY.register(Box::new(LAST_CYCLE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(TOKENS_PROCESSED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKEN_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROTATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROTATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(VALIDITY_REMAINING.clone()))?;
    REGISTRY.register(Box::new(STORAGE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REVOCATIONS_TOTAL.clone()))?;

    Ok(())
}

/// Text exposition of every registered metric
#[must_use]
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

/// Event sink that feeds the Prometheus metrics above
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusEventSink;

impl EventSink for PrometheusEventSink {
    fn emit(&self, event: &RotationEvent) {
        match event {
            RotationEvent::Evaluated {
                label,
                seconds_remaining,
                ..
            } => VALIDITY_REMAINING
                .with_label_values(&[label.as_str()])
                .set(*seconds_remaining),
            RotationEvent::Created { label, .. } => ROTATIONS_TOTAL
                .with_label_values(&[label.as_str(), "created"])
                .inc(),
            RotationEvent::Rotated { label, .. } => ROTATIONS_TOTAL
                .with_label_values(&[label.as_str(), "rotated"])
                .inc(),
            RotationEvent::Unchanged { .. } => {}
            RotationEvent::StorageWriteFailed { target, .. } => STORAGE_ERRORS_TOTAL
                .with_label_values(&[target.as_str(), "secret"])
                .inc(),
            RotationEvent::RecordWriteFailed { target, .. } => STORAGE_ERRORS_TOTAL
                .with_label_values(&[target.as_str(), "record"])
                .inc(),
            RotationEvent::Failed { label, kind } => {
                TOKEN_FAILURES_TOTAL
                    .with_label_values(&[label.as_str(), *kind])
                    .inc();
                ROTATIONS_TOTAL
                    .with_label_values(&[label.as_str(), "failed"])
                    .inc();
            }
            RotationEvent::Processed { label, duration } => {
                TOKENS_PROCESSED_TOTAL.inc();
                ROTATION_DURATION
                    .with_label_values(&[label.as_str()])
                    .observe(duration.as_secs_f64());
            }
            RotationEvent::Revoked { label, .. } => REVOCATIONS_TOTAL
                .with_label_values(&[label.as_str(), "revoked"])
                .inc(),
            RotationEvent::RevocationFailed { label, .. } => REVOCATIONS_TOTAL
                .with_label_values(&[label.as_str(), "failed"])
                .inc(),
            RotationEvent::CycleCompleted {
                failed, duration, ..
            } => {
                CYCLES_TOTAL.inc();
                CYCLE_DURATION.observe(duration.as_secs_f64());
                #[allow(
                    clippy::cast_precision_loss,
                    reason = "Per-cycle token counts are far below f64 precision limits"
                )]
                LAST_CYCLE_FAILURES.set(*failed as f64);
            }
        }
    }
}
