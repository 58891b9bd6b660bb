//! # Constants
//!
//! Shared constants used throughout the rotator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default daemon mode when `daemon.mode` is not set
pub const DEFAULT_DAEMON_MODE: &str = "daemon";

/// Default interval between rotation cycles in daemon mode
pub const DEFAULT_CHECK_INTERVAL: &str = "30m";

/// Default percentage of validity remaining at which a token is rotated
pub const DEFAULT_THRESHOLD_PERCENT: u8 = 10;

/// Default Vault KV v2 mount path
pub const DEFAULT_VAULT_MOUNT_PATH: &str = "secret";

/// Default log level when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log format (json, text)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Longest validity a managed token may be issued with (180 days)
pub const MAX_VALIDITY_SECS: u64 = 180 * 86_400;

/// Length of a month in validity strings such as `6mo`
pub const DAYS_PER_MONTH: u64 = 30;

/// Default Linode API base URL
pub const DEFAULT_LINODE_API_URL: &str = "https://api.linode.com/v4";

/// Page size requested when listing Linode tokens
pub const LINODE_PAGE_SIZE: u32 = 500;

/// Timeout applied to every outbound HTTP request (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Key under which the token value is stored in a Vault KV v2 secret
pub const VAULT_TOKEN_KEY: &str = "token";
