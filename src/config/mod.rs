//! # Configuration
//!
//! Declarative configuration for the rotator, loaded from one YAML file or
//! a glob of files that are merged together.
//!
//! ```yaml
//! daemon:
//!   mode: daemon            # or one-shot
//!   check_interval: 30m
//!   dry_run: false
//! rotation:
//!   threshold_percent: 10
//!   prune_expired: true
//! vault:
//!   address: https://vault.internal:8200
//!   role_id: ${VAULT_ROLE_ID}
//!   secret_id: ${VAULT_SECRET_ID}
//!   mount_path: secret
//! tokens:
//!   - label: ci-deployer
//!     team: platform
//!     validity: 90d
//!     scopes: "linodes:read_write"
//!     storage:
//!       - type: vault
//!         path: ci/linode
//! ```

pub mod duration;
pub mod env;
mod error;
pub mod loader;
pub mod runtime;

pub use error::ConfigError;
pub use loader::{load, load_and_validate, load_glob};
pub use runtime::RuntimeConfig;

use crate::constants::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_DAEMON_MODE, DEFAULT_LOG_FORMAT, DEFAULT_LOG_LEVEL,
    DEFAULT_THRESHOLD_PERCENT, DEFAULT_VAULT_MOUNT_PATH,
};
use crate::model::CredentialPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// How the scheduler drives rotation cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run cycles forever on `check_interval`
    Daemon,
    /// Run exactly one cycle and exit
    OneShot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatorConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub tokens: Vec<CredentialPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub check_interval: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default)]
    pub threshold_percent: u8,
    #[serde(default)]
    pub prune_expired: bool,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub role_id: String,
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub mount_path: String,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("mount_path", &self.mount_path)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub otel_endpoint: String,
    #[serde(default)]
    pub log_level: String,
    #[serde(default)]
    pub log_format: String,
}

impl RotatorConfig {
    /// Parse YAML after expanding environment variable references
    ///
    /// # Errors
    ///
    /// Returns the YAML error when the expanded document does not parse.
    pub fn parse(data: &str) -> Result<Self, serde_yaml::Error> {
        let expanded = env::expand_env(data);
        serde_yaml::from_str(&expanded)
    }

    /// Fill in defaults for optional fields left empty
    pub fn apply_defaults(&mut self) {
        if self.daemon.mode.is_empty() {
            self.daemon.mode = DEFAULT_DAEMON_MODE.to_string();
        }
        if self.daemon.check_interval.is_empty() {
            self.daemon.check_interval = DEFAULT_CHECK_INTERVAL.to_string();
        }
        if self.rotation.threshold_percent == 0 {
            self.rotation.threshold_percent = DEFAULT_THRESHOLD_PERCENT;
        }
        if self.vault.mount_path.is_empty() {
            self.vault.mount_path = DEFAULT_VAULT_MOUNT_PATH.to_string();
        }
        if self.observability.log_level.is_empty() {
            self.observability.log_level = DEFAULT_LOG_LEVEL.to_string();
        }
        if self.observability.log_format.is_empty() {
            self.observability.log_format = DEFAULT_LOG_FORMAT.to_string();
        }
    }

    /// Check that the configuration is complete and consistent
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault.address.is_empty() {
            return Err(ConfigError::Invalid("vault address is required".to_string()));
        }
        if self.vault.role_id.is_empty() {
            return Err(ConfigError::Invalid("vault role_id is required".to_string()));
        }
        if self.vault.secret_id.is_empty() {
            return Err(ConfigError::Invalid("vault secret_id is required".to_string()));
        }

        self.run_mode()?;
        self.check_interval()?;

        if self.rotation.threshold_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "rotation threshold_percent must be between 0 and 100, got {}",
                self.rotation.threshold_percent
            )));
        }

        if self.tokens.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one token must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (index, token) in self.tokens.iter().enumerate() {
            validate_token(token, index)?;
            if !seen.insert(token.label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "token[{index}]: duplicate token label '{}'",
                    token.label
                )));
            }
        }

        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown mode.
    pub fn run_mode(&self) -> Result<RunMode, ConfigError> {
        match self.daemon.mode.as_str() {
            "daemon" | "" => Ok(RunMode::Daemon),
            "one-shot" => Ok(RunMode::OneShot),
            other => Err(ConfigError::Invalid(format!(
                "daemon mode must be 'daemon' or 'one-shot', got '{other}'"
            ))),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDuration`] when the interval does not parse.
    pub fn check_interval(&self) -> Result<Duration, ConfigError> {
        if self.daemon.check_interval.is_empty() {
            return duration::parse_interval(DEFAULT_CHECK_INTERVAL);
        }
        duration::parse_interval(&self.daemon.check_interval)
    }

    /// Labels of every configured token, in declaration order
    #[must_use]
    pub fn managed_labels(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.label.clone()).collect()
    }

    /// Merge `other` over `self`: non-empty scalars override, tokens append
    #[must_use]
    pub fn merge(mut self, other: RotatorConfig) -> RotatorConfig {
        override_string(&mut self.daemon.mode, other.daemon.mode);
        override_string(&mut self.daemon.check_interval, other.daemon.check_interval);
        self.daemon.dry_run |= other.daemon.dry_run;

        if other.rotation.threshold_percent != 0 {
            self.rotation.threshold_percent = other.rotation.threshold_percent;
        }
        self.rotation.prune_expired |= other.rotation.prune_expired;

        override_string(&mut self.vault.address, other.vault.address);
        override_string(&mut self.vault.role_id, other.vault.role_id);
        override_string(&mut self.vault.secret_id, other.vault.secret_id);
        override_string(&mut self.vault.mount_path, other.vault.mount_path);

        override_string(
            &mut self.observability.otel_endpoint,
            other.observability.otel_endpoint,
        );
        override_string(&mut self.observability.log_level, other.observability.log_level);
        override_string(&mut self.observability.log_format, other.observability.log_format);

        self.tokens.extend(other.tokens);
        self
    }
}

fn override_string(target: &mut String, value: String) {
    if !value.is_empty() {
        *target = value;
    }
}

fn validate_token(token: &CredentialPolicy, index: usize) -> Result<(), ConfigError> {
    if token.label.is_empty() {
        return Err(ConfigError::Invalid(format!("token[{index}]: token label is required")));
    }
    if token.validity.is_empty() {
        return Err(ConfigError::Invalid(format!("token[{index}]: token validity is required")));
    }
    if token.scopes.is_empty() {
        return Err(ConfigError::Invalid(format!("token[{index}]: token scopes is required")));
    }
    if token.storage.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "token[{index}]: at least one storage backend is required"
        )));
    }
    if let Some(target) = token.storage.iter().find(|t| t.path.trim().is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "token[{index}]: storage path is required for {:?} backend",
            target.kind
        )));
    }
    if token.rotation_threshold > 100 {
        return Err(ConfigError::Invalid(format!(
            "token[{index}]: rotation_threshold must be between 0 and 100, got {}",
            token.rotation_threshold
        )));
    }

    let validity = token.validity_duration().map_err(|e| {
        ConfigError::Invalid(format!("token[{index}]: invalid validity period: {e}"))
    })?;
    if validity.is_zero() {
        return Err(ConfigError::Invalid(format!(
            "token[{index}]: validity period must be greater than zero"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StorageTarget;

    fn token(label: &str) -> CredentialPolicy {
        CredentialPolicy {
            label: label.to_string(),
            team: "platform".to_string(),
            validity: "90d".to_string(),
            scopes: "*".to_string(),
            rotation_threshold: 0,
            storage: vec![StorageTarget::vault(format!("tokens/{label}"))],
        }
    }

    fn valid_config() -> RotatorConfig {
        let mut cfg = RotatorConfig {
            vault: VaultConfig {
                address: "http://127.0.0.1:8200".to_string(),
                role_id: "role".to_string(),
                secret_id: "secret".to_string(),
                mount_path: String::new(),
            },
            tokens: vec![token("t1")],
            ..RotatorConfig::default()
        };
        cfg.apply_defaults();
        cfg
    }

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
daemon:
  mode: one-shot
  check_interval: 15m
  dry_run: true
rotation:
  threshold_percent: 20
  prune_expired: true
vault:
  address: http://vault:8200
  role_id: r
  secret_id: s
tokens:
  - label: t1
    team: infra
    validity: 90d
    scopes: "*"
    rotation_threshold: 15
    storage:
      - type: vault
        path: infra/t1
"#;
        let cfg = RotatorConfig::parse(yaml).unwrap();
        assert_eq!(cfg.daemon.mode, "one-shot");
        assert!(cfg.daemon.dry_run);
        assert_eq!(cfg.rotation.threshold_percent, 20);
        assert!(cfg.rotation.prune_expired);
        assert_eq!(cfg.tokens.len(), 1);
        assert_eq!(cfg.tokens[0].rotation_threshold, 15);
        assert_eq!(cfg.tokens[0].storage[0], StorageTarget::vault("infra/t1"));
        assert_eq!(cfg.run_mode().unwrap(), RunMode::OneShot);
        assert_eq!(cfg.check_interval().unwrap(), Duration::from_secs(900));
    }

    #[test]
    fn test_apply_defaults() {
        let mut cfg = RotatorConfig::default();
        cfg.apply_defaults();
        assert_eq!(cfg.daemon.mode, "daemon");
        assert_eq!(cfg.daemon.check_interval, "30m");
        assert_eq!(cfg.rotation.threshold_percent, 10);
        assert_eq!(cfg.vault.mount_path, "secret");
        assert_eq!(cfg.observability.log_level, "info");
        assert_eq!(cfg.observability.log_format, "text");
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_vault_fields() {
        let mut cfg = valid_config();
        cfg.vault.role_id.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("role_id"));
    }

    #[test]
    fn test_no_tokens() {
        let mut cfg = valid_config();
        cfg.tokens.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_token_requires_storage() {
        let mut cfg = valid_config();
        cfg.tokens[0].storage.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("storage backend"));
    }

    #[test]
    fn test_validity_ceiling() {
        let mut cfg = valid_config();
        cfg.tokens[0].validity = "180d".to_string();
        assert!(cfg.validate().is_ok());

        cfg.tokens[0].validity = "7mo".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("180d"));
    }

    #[test]
    fn test_malformed_validity() {
        let mut cfg = valid_config();
        cfg.tokens[0].validity = "ninety days".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid validity period"));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let mut cfg = valid_config();
        cfg.tokens.push(token("t1"));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let mut cfg = valid_config();
        cfg.daemon.mode = "cron".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_merge_overrides_scalars_and_appends_tokens() {
        let base = valid_config();
        let other = RotatorConfig {
            daemon: DaemonConfig {
                mode: "one-shot".to_string(),
                ..DaemonConfig::default()
            },
            rotation: RotationConfig {
                threshold_percent: 25,
                prune_expired: true,
            },
            tokens: vec![token("t2")],
            ..RotatorConfig::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.daemon.mode, "one-shot");
        assert_eq!(merged.daemon.check_interval, "30m");
        assert_eq!(merged.rotation.threshold_percent, 25);
        assert!(merged.rotation.prune_expired);
        assert_eq!(merged.vault.address, "http://127.0.0.1:8200");
        assert_eq!(merged.managed_labels(), vec!["t1".to_string(), "t2".to_string()]);
    }

    #[test]
    fn test_vault_debug_hides_credentials() {
        let cfg = valid_config();
        let rendered = format!("{:?}", cfg.vault);
        assert!(!rendered.contains("role_id"));
        assert!(!rendered.contains("secret_id"));
        assert!(rendered.contains("127.0.0.1"));
    }
}
