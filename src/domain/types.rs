//! Core type definitions for the attested-rewards service
//!
//! Identifiers are caller-supplied opaque strings wrapped in newtypes;
//! the attestation shape mirrors what the proving extension emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session identifier issued by the proof-producing actor.
///
/// Opaque to this service; never parsed, only used as a registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A proven account identity (e.g. a screen name).
///
/// Only identities produced by a successful verification or session
/// redemption may be used as allocation keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Client-supplied attestation: an opaque proof blob plus the metadata
/// identifying the notary that can validate it.
///
/// `data` is hex-encoded and is never parsed outside the proof verifier.
/// The metadata is attacker-influenceable; in particular `notary_url` is
/// only ever used as a locator, never as a source of key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub version: String,
    pub data: String,
    pub meta: AttestationMeta,
}

/// Notary metadata attached to an attestation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationMeta {
    pub notary_url: String,
    pub websocket_proxy_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_url: Option<String>,
}

/// Verified plaintext recovered from an attestation.
///
/// Redacted ranges are masked by the verifier; only the sent/received
/// strings cross this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub sent: String,
    pub recv: String,
}

/// One unassigned reward link in the finite pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    /// Stable key derived from the link content; used for idempotent
    /// seeding and as the delete target of the allocation transaction.
    pub key: String,
    pub link: String,
}

impl PoolEntry {
    /// Build a pool entry from a raw reward link.
    pub fn from_link(link: impl Into<String>) -> Self {
        use sha2::{Digest, Sha256};

        let link = link.into();
        let mut hasher = Sha256::new();
        hasher.update(link.as_bytes());
        let key = hex::encode(&hasher.finalize()[..16]);
        Self { key, link }
    }
}

/// The durable record of "this identity already redeemed".
///
/// Created exactly once per identity; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub identity: Identity,
    pub link: String,
    pub assigned_at: DateTime<Utc>,
}
