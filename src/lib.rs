//! API Token Rotator Library
//!
//! Keeps expiring Linode API tokens fresh. Each configured token is checked
//! against its declared validity; when the remaining share drops to the
//! rotation threshold a replacement is minted, stored in Vault, and recorded
//! alongside a rotation counter. Tests are included in the module files and
//! under `tests/`.

pub mod config;
pub mod constants;
pub mod cycle;
pub mod model;
pub mod observability;
pub mod provider;
pub mod rotation;
pub mod scheduler;
pub mod server;

pub use config::{RotatorConfig, RunMode, RuntimeConfig};
pub use cycle::{prune_expired, run_cycle, CycleSummary};
pub use model::{Credential, CredentialPolicy, RotationRecord, SecretValue, StorageTarget};
pub use rotation::{ProcessOutcome, RotationEngine, RotationError};
pub use scheduler::{RunReport, Scheduler};
