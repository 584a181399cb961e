//! Registrar authentication
//!
//! The register-session operation is called by the out-of-band
//! proof-producing actor, not by browsers. When a registrar key is
//! configured, that route requires it; without one the route is open
//! (local development). Only the key hash is ever held in memory.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Registrar authentication failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing registrar credentials")]
    MissingAuth,
    #[error("invalid registrar key")]
    InvalidKey,
}

/// Shared-key gate for the session registration route.
#[derive(Clone)]
pub struct RegistrarAuth {
    /// Hash of the registrar key (never store plaintext)
    key_hash: Option<String>,
}

impl RegistrarAuth {
    /// No key configured; registration is open.
    pub fn disabled() -> Self {
        Self { key_hash: None }
    }

    pub fn new(key: &str) -> Self {
        Self {
            key_hash: Some(Self::hash_key(key)),
        }
    }

    /// Reads `REGISTRAR_API_KEY`; empty or unset disables the gate.
    pub fn from_env() -> Self {
        match std::env::var("REGISTRAR_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Self::new(key.trim()),
            _ => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key_hash.is_some()
    }

    /// Hash a registrar key for comparison.
    pub fn hash_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Validate an Authorization header value.
    pub fn validate(&self, auth_header: Option<&str>) -> Result<(), AuthError> {
        let Some(expected) = &self.key_hash else {
            return Ok(());
        };

        let header = auth_header.ok_or(AuthError::MissingAuth)?;
        let key = header.strip_prefix("Bearer ").unwrap_or(header).trim();

        if Self::hash_key(key) == *expected {
            Ok(())
        } else {
            Err(AuthError::InvalidKey)
        }
    }
}

/// Axum middleware enforcing the registrar key.
pub async fn registrar_middleware(
    State(auth): State<RegistrarAuth>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth.validate(auth_header) {
        Ok(()) => next.run(request).await,
        Err(error) => {
            tracing::warn!(%error, "session registration rejected");
            (
                StatusCode::UNAUTHORIZED,
                axum::Json(serde_json::json!({ "error": error.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_gate_accepts_anything() {
        let auth = RegistrarAuth::disabled();
        assert_eq!(auth.validate(None), Ok(()));
        assert_eq!(auth.validate(Some("Bearer whatever")), Ok(()));
    }

    #[test]
    fn enabled_gate_requires_the_key() {
        let auth = RegistrarAuth::new("registrar-secret");

        assert_eq!(auth.validate(None), Err(AuthError::MissingAuth));
        assert_eq!(
            auth.validate(Some("Bearer wrong")),
            Err(AuthError::InvalidKey)
        );
        assert_eq!(auth.validate(Some("Bearer registrar-secret")), Ok(()));
    }

    #[test]
    fn raw_key_without_bearer_prefix_works() {
        let auth = RegistrarAuth::new("registrar-secret");
        assert_eq!(auth.validate(Some("registrar-secret")), Ok(()));
    }

    #[test]
    fn key_hash_is_sha256_hex() {
        assert_eq!(RegistrarAuth::hash_key("x").len(), 64);
    }
}
