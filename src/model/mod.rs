//! # Domain Model
//!
//! Types shared by the rotation engine, the cycle orchestrator and the
//! issuer / secret-store adapters.
//!
//! - [`Credential`]: a token as observed at the issuer
//! - [`CredentialPolicy`]: the declared intent for one managed label
//! - [`RotationRecord`]: bookkeeping persisted next to the stored secret
//! - [`ValidityWindow`]: the validity arithmetic that drives rotation

pub mod clock;
pub mod credential;
pub mod policy;
pub mod record;
pub mod secret;
pub mod validity;

pub use clock::{Clock, FixedClock, SystemClock};
pub use credential::{select_current, Credential, CredentialId};
pub use policy::{CredentialPolicy, StorageKind, StorageTarget};
pub use record::RotationRecord;
pub use secret::SecretValue;
pub use validity::ValidityWindow;
