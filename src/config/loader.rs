//! # Config Loading
//!
//! Reads a single file or every file matching a glob pattern. Multiple files
//! are merged in sorted path order so that team-owned token lists can live
//! in separate files next to one shared base file.

use super::{ConfigError, RotatorConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read and parse a single configuration file
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn load(path: &Path) -> Result<RotatorConfig, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    RotatorConfig::parse(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and merge every file matching `pattern`
///
/// # Errors
///
/// Returns [`ConfigError::NoMatches`] when nothing matches, or the first
/// file's load error.
pub fn load_glob(pattern: &str) -> Result<RotatorConfig, ConfigError> {
    let entries = glob::glob(pattern).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    paths.sort();

    if paths.is_empty() {
        return Err(ConfigError::NoMatches(pattern.to_string()));
    }

    let mut merged: Option<RotatorConfig> = None;
    for path in &paths {
        debug!(path = %path.display(), "loading config file");
        let cfg = load(path)?;
        merged = Some(match merged {
            None => cfg,
            Some(base) => base.merge(cfg),
        });
    }

    merged.ok_or_else(|| ConfigError::NoMatches(pattern.to_string()))
}

/// Load a path or glob, apply defaults and validate
///
/// # Errors
///
/// Returns any load, parse or validation error.
pub fn load_and_validate(path_or_pattern: &str) -> Result<RotatorConfig, ConfigError> {
    let mut cfg = if contains_glob_char(path_or_pattern) {
        load_glob(path_or_pattern)?
    } else {
        load(Path::new(path_or_pattern))?
    };

    cfg.apply_defaults();
    cfg.validate()?;
    Ok(cfg)
}

fn contains_glob_char(path: &str) -> bool {
    path.contains(['*', '?', '['])
}
