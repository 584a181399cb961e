//! Error types for the attested-rewards infrastructure

use thiserror::Error;

use crate::domain::{Identity, SessionId};

/// Errors that can occur in the service core.
///
/// Every public operation returns either a success value or exactly one
/// of these; storage and network faults never escape as panics.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing or malformed caller input
    #[error("invalid request: {0}")]
    Validation(String),

    /// Session not present after the polling budget, or never registered
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Notary public key could not be resolved
    #[error("notary key resolution failed: {0}")]
    KeyResolution(String),

    /// Attestation failed verification against the notary key
    #[error("attestation verification failed: {0}")]
    Verification(String),

    /// Identity was not produced by a verification or redemption step
    #[error("identity has not completed verification: {0}")]
    IdentityUnverified(Identity),

    /// Reward pool is empty; an expected terminal condition, not a fault
    #[error("reward pool exhausted")]
    PoolExhausted,

    /// Backing-store fault; distinct from exhaustion and retryable
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Storage(err.to_string())
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
