//! attested-rewards
//!
//! A web service that lets a client cryptographically prove ownership of
//! an account identity and redeem a scarce one-per-identity reward:
//!
//! - [`notary`] - Notary public key resolution
//! - [`attestation`] - Attestation verification and identity extraction
//! - [`infra`] - Session registry, allocation engine, reward stores
//! - [`auth`] - Registrar authentication for session writers
//! - [`api`] - REST API routes and error responses
//! - [`server`] - Configuration and HTTP server bootstrap
//! - [`domain`] - Core domain types

pub mod api;
pub mod attestation;
pub mod auth;
pub mod domain;
pub mod infra;
pub mod migrations;
pub mod notary;
pub mod server;

// Re-export commonly used types
pub use domain::{Assignment, Attestation, AttestationMeta, Identity, PoolEntry, SessionId, Transcript};

pub use infra::{
    AllocationEngine, Result, RewardStore, ServiceError, SessionRegistry, SqliteRewardStore,
};
