//! # Observability
//!
//! - `metrics`: Prometheus metrics, fed by [`PrometheusEventSink`]
//! - `logging`: tracing subscriber setup

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{register_metrics, PrometheusEventSink};
