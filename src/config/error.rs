//! Configuration error kinds.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid glob pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("no config files found matching pattern: {0}")]
    NoMatches(String),

    #[error("invalid validity format '{0}' (expected <number><unit>, e.g. 90d, 6mo)")]
    InvalidValidity(String),

    #[error("validity '{value}' exceeds the maximum of {max_days}d")]
    ValidityTooLong { value: String, max_days: u64 },

    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("config validation failed: {0}")]
    Invalid(String),
}
