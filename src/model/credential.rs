//! # Credentials
//!
//! A credential as observed at the issuer. The secret value is only present
//! on the response to a create call; listing never returns it.

use super::SecretValue;
use chrono::{DateTime, Duration, Utc};

/// Issuer-assigned identifier
pub type CredentialId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: CredentialId,
    pub label: String,
    pub secret: Option<SecretValue>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub scopes: String,
}

impl Credential {
    /// Validity the issuer actually granted (expiry minus creation)
    #[must_use]
    pub fn issued_validity(&self) -> Duration {
        self.expires_at - self.created_at
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Pick the credential that counts as "current" for a label.
///
/// Several credentials can share a label while an earlier rotation's
/// predecessor is still alive. The most recently created one wins; among
/// exact ties the first in issuer order is kept.
#[must_use]
pub fn select_current(credentials: &[Credential]) -> Option<&Credential> {
    credentials.iter().fold(None, |best: Option<&Credential>, candidate| match best {
        Some(current) if current.created_at >= candidate.created_at => Some(current),
        _ => Some(candidate),
    })
}
