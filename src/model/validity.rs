//! # Validity Calculator
//!
//! Pure functions over a credential's expiry and its declared validity.
//! Nothing here fails: malformed durations are rejected when the
//! configuration is validated.

use super::Credential;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Expiry of a credential paired with the validity its policy declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub expires_at: DateTime<Utc>,
    pub validity: Duration,
}

impl ValidityWindow {
    #[must_use]
    pub fn new(expires_at: DateTime<Utc>, validity: Duration) -> Self {
        Self {
            expires_at,
            validity,
        }
    }

    /// Window for an observed credential under its policy's declared validity
    #[must_use]
    pub fn for_credential(credential: &Credential, validity: Duration) -> Self {
        Self::new(credential.expires_at, validity)
    }

    /// `now` is strictly after the expiry timestamp
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Seconds until expiry, clamped at zero
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        reason = "Millisecond counts for token lifetimes are far below f64 precision limits"
    )]
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> f64 {
        let remaining_ms = (self.expires_at - now).num_milliseconds().max(0);
        remaining_ms as f64 / 1000.0
    }

    /// Percentage of the declared validity still remaining, never negative
    #[must_use]
    pub fn percent_remaining(&self, now: DateTime<Utc>) -> f64 {
        if self.is_expired(now) {
            return 0.0;
        }
        let validity_secs = self.validity.as_secs_f64();
        if validity_secs <= 0.0 {
            return 0.0;
        }
        // Multiply first so whole-percent boundaries stay exact
        self.seconds_remaining(now) * 100.0 / validity_secs
    }

    /// Expired, or at or below the threshold (inclusive)
    #[must_use]
    pub fn needs_rotation(&self, threshold_percent: u8, now: DateTime<Utc>) -> bool {
        self.is_expired(now) || self.percent_remaining(now) <= f64::from(threshold_percent)
    }
}
