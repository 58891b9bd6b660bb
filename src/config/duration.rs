//! # Duration Parsing
//!
//! Two duration grammars appear in the configuration:
//!
//! - token validity: `<number><unit>` with units `mo` (30 days), `d`, `h`, `m`
//! - check interval: `<number><unit>` with units `s`, `m`, `h`, `d`

use super::ConfigError;
use crate::constants::DAYS_PER_MONTH;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static VALIDITY_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?P<number>\d+)(?P<unit>mo|d|h|m)$").ok());

static INTERVAL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$").ok());

/// Split `<number><unit>` using `regex`, returning the number and the unit
fn split_duration<'a>(regex: Option<&Regex>, value: &'a str) -> Option<(u64, &'a str)> {
    let captures = regex?.captures(value)?;
    let number = captures.name("number")?.as_str().parse::<u64>().ok()?;
    let unit = captures.name("unit")?.as_str();
    Some((number, unit))
}

/// Parse a token validity string (`90d`, `6mo`, `12h`, `30m`)
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValidity`] for anything outside the grammar.
pub fn parse_validity_duration(validity: &str) -> Result<Duration, ConfigError> {
    let (number, unit) = split_duration(VALIDITY_REGEX.as_ref(), validity)
        .ok_or_else(|| ConfigError::InvalidValidity(validity.to_string()))?;

    let seconds = match unit {
        "mo" => number.checked_mul(DAYS_PER_MONTH * 86_400),
        "d" => number.checked_mul(86_400),
        "h" => number.checked_mul(3_600),
        "m" => number.checked_mul(60),
        _ => None,
    }
    .ok_or_else(|| ConfigError::InvalidValidity(validity.to_string()))?;

    Ok(Duration::from_secs(seconds))
}

/// Parse a check interval (`30s`, `30m`, `1h`, `1d`)
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDuration`] for malformed or zero intervals.
pub fn parse_interval(interval: &str) -> Result<Duration, ConfigError> {
    let trimmed = interval.trim().to_lowercase();
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: interval.to_string(),
        reason: reason.to_string(),
    };

    let (number, unit) = split_duration(INTERVAL_REGEX.as_ref(), &trimmed)
        .ok_or_else(|| invalid("expected <number><unit> with unit s, m, h or d (e.g. '30m')"))?;

    if number == 0 {
        return Err(invalid("interval must be greater than 0"));
    }

    let seconds = match unit {
        "s" => Some(number),
        "m" => number.checked_mul(60),
        "h" => number.checked_mul(3_600),
        "d" => number.checked_mul(86_400),
        _ => None,
    }
    .ok_or_else(|| invalid("interval out of range"))?;

    Ok(Duration::from_secs(seconds))
}
