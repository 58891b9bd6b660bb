//! # Rotation Records
//!
//! Bookkeeping persisted for each managed label. The record is the only
//! source of truth for how many times a label has been rotated; it is never
//! rebuilt from the issuer's token list.
//!
//! On the wire the record is a flat string map (Vault KV v2 custom metadata
//! only accepts strings). Parsing is lenient: a malformed field falls back to
//! its empty value instead of rejecting the whole record.

use super::{Credential, CredentialId, SecretValue};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

const KEY_LABEL: &str = "label";
const KEY_CURRENT_ID: &str = "current_linode_id";
const KEY_LAST_ROTATED_AT: &str = "last_rotated_at";
const KEY_PREVIOUS_ID: &str = "previous_linode_id";
const KEY_PREVIOUS_EXPIRES_AT: &str = "previous_expires_at";
const KEY_ROTATION_COUNT: &str = "rotation_count";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationRecord {
    pub label: String,
    pub current_id: CredentialId,
    /// Not part of the metadata map; adapters fill it from the stored secret
    pub current_secret: Option<SecretValue>,
    pub last_rotated_at: DateTime<Utc>,
    /// Outgoing credential, left alive at the issuer until it expires
    pub previous_id: Option<CredentialId>,
    pub previous_expires_at: Option<DateTime<Utc>>,
    pub rotation_count: u64,
}

impl RotationRecord {
    /// Record for a freshly minted credential with no predecessor.
    ///
    /// The counter is carried over from `prior` unchanged (a re-creation is
    /// not a rotation) and starts at zero otherwise.
    #[must_use]
    pub fn after_creation(
        minted: &Credential,
        prior: Option<&RotationRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            label: minted.label.clone(),
            current_id: minted.id,
            current_secret: minted.secret.clone(),
            last_rotated_at: now,
            previous_id: None,
            previous_expires_at: None,
            rotation_count: prior.map_or(0, |r| r.rotation_count),
        }
    }

    /// Record for a credential minted to replace `outgoing`
    #[must_use]
    pub fn after_rotation(
        minted: &Credential,
        outgoing: &Credential,
        prior: Option<&RotationRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            label: minted.label.clone(),
            current_id: minted.id,
            current_secret: minted.secret.clone(),
            last_rotated_at: now,
            previous_id: Some(outgoing.id),
            previous_expires_at: Some(outgoing.expires_at),
            rotation_count: prior.map_or(0, |r| r.rotation_count) + 1,
        }
    }

    #[must_use]
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(KEY_LABEL.to_string(), self.label.clone());
        map.insert(KEY_CURRENT_ID.to_string(), self.current_id.to_string());
        map.insert(
            KEY_LAST_ROTATED_AT.to_string(),
            self.last_rotated_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        map.insert(
            KEY_PREVIOUS_ID.to_string(),
            self.previous_id.unwrap_or(0).to_string(),
        );
        if let Some(expires) = self.previous_expires_at {
            map.insert(
                KEY_PREVIOUS_EXPIRES_AT.to_string(),
                expires.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
        map.insert(
            KEY_ROTATION_COUNT.to_string(),
            self.rotation_count.to_string(),
        );
        map
    }

    /// Parse a metadata map. Returns `None` when the map carries no record.
    #[must_use]
    pub fn from_metadata(map: &BTreeMap<String, String>) -> Option<Self> {
        if !map.contains_key(KEY_CURRENT_ID) && !map.contains_key(KEY_ROTATION_COUNT) {
            return None;
        }

        let parse_id = |key: &str| map.get(key).and_then(|v| v.trim().parse::<u64>().ok());
        let parse_time = |key: &str| {
            map.get(key)
                .and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
                .map(|t| t.with_timezone(&Utc))
        };

        Some(Self {
            label: map.get(KEY_LABEL).cloned().unwrap_or_default(),
            current_id: parse_id(KEY_CURRENT_ID).unwrap_or(0),
            current_secret: None,
            last_rotated_at: parse_time(KEY_LAST_ROTATED_AT).unwrap_or(DateTime::UNIX_EPOCH),
            previous_id: parse_id(KEY_PREVIOUS_ID).filter(|id| *id != 0),
            previous_expires_at: parse_time(KEY_PREVIOUS_EXPIRES_AT),
            rotation_count: parse_id(KEY_ROTATION_COUNT).unwrap_or(0),
        })
    }
}
