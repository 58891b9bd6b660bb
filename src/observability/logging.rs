//! # Logging
//!
//! `tracing-subscriber` setup. `RUST_LOG` wins when set; otherwise the
//! configured level applies to this crate and `warn` to everything else.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Parse `json` or `text` (case-insensitive); anything else is text
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Filter directive used when `RUST_LOG` is unset
#[must_use]
pub fn default_directive(level: &str) -> String {
    let level = if level.trim().is_empty() {
        crate::constants::DEFAULT_LOG_LEVEL
    } else {
        level.trim()
    };
    format!("warn,api_token_rotator={level},token_rotator={level}")
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}
