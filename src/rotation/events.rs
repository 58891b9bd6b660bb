//! # Rotation Events
//!
//! The engine and the cycle orchestrator report what they did through an
//! injected [`EventSink`] instead of touching process-wide metrics. The
//! binary wires in the Prometheus sink; tests use [`RecordingEventSink`].

use crate::model::CredentialId;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum RotationEvent {
    /// A current credential was found and measured against its validity
    Evaluated {
        label: String,
        seconds_remaining: f64,
        percent_remaining: f64,
    },
    Created {
        label: String,
        credential_id: CredentialId,
    },
    Rotated {
        label: String,
        credential_id: CredentialId,
        previous_id: CredentialId,
    },
    Unchanged {
        label: String,
    },
    StorageWriteFailed {
        label: String,
        target: String,
    },
    RecordWriteFailed {
        label: String,
        target: String,
    },
    /// `process_credential` returned an error of the given kind
    Failed {
        label: String,
        kind: &'static str,
    },
    /// `process_credential` returned, successfully or not
    Processed {
        label: String,
        duration: Duration,
    },
    Revoked {
        label: String,
        credential_id: CredentialId,
    },
    RevocationFailed {
        label: String,
        credential_id: CredentialId,
    },
    CycleCompleted {
        processed: usize,
        failed: usize,
        duration: Duration,
    },
}

pub trait EventSink: Send + Sync + fmt::Debug {
    fn emit(&self, event: &RotationEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &RotationEvent) {}
}

/// Keeps every event in memory for assertions
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<RotationEvent>>,
}

impl RecordingEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<RotationEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&RotationEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &RotationEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
