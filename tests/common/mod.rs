//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use attested_rewards::attestation::{
    AttestationVerifier, ProofVerifier, ScreenNameExtractor,
};
use attested_rewards::auth::RegistrarAuth;
use attested_rewards::domain::{PoolEntry, Transcript};
use attested_rewards::infra::{
    AllocationEngine, RewardStore, ServiceError, SessionRegistry, SqliteRewardStore,
    VerifiedIdentities,
};
use attested_rewards::notary::NotaryKeyResolver;
use attested_rewards::server::{build_router, AppState};

/// Generate a random identity
pub fn random_identity(prefix: &str) -> String {
    format!("{}-{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Proof verifier stub: succeeds with a transcript carrying the given
/// screen name, or rejects everything.
pub struct StubProofVerifier {
    pub screen_name: Option<String>,
    pub fail: bool,
}

impl StubProofVerifier {
    pub fn proving(screen_name: &str) -> Self {
        Self {
            screen_name: Some(screen_name.to_string()),
            fail: false,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            screen_name: None,
            fail: true,
        }
    }

    /// Verifies, but the transcript has no extractable identity.
    pub fn opaque() -> Self {
        Self {
            screen_name: None,
            fail: false,
        }
    }
}

impl ProofVerifier for StubProofVerifier {
    fn verify(&self, _data: &str, _notary_key_pem: &str) -> attested_rewards::Result<Transcript> {
        if self.fail {
            return Err(ServiceError::Verification("stub rejection".to_string()));
        }

        let recv = match &self.screen_name {
            Some(name) => format!(
                "HTTP/1.1 200 OK\r\n\r\n{{\"id\":42,\"screen_name\":\"{name}\"}}"
            ),
            None => "HTTP/1.1 200 OK\r\n\r\n{}".to_string(),
        };

        Ok(Transcript {
            sent: "GET /1.1/account/settings.json HTTP/1.1".to_string(),
            recv,
        })
    }
}

/// Open a single-connection in-memory reward store.
pub async fn test_store(links: &[&str]) -> SqliteRewardStore {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    let store = SqliteRewardStore::new(pool);
    store.initialize().await.unwrap();

    let entries: Vec<PoolEntry> = links.iter().map(|link| PoolEntry::from_link(*link)).collect();
    store.add_pool_entries(&entries).await.unwrap();
    store
}

/// Create full application state for testing.
///
/// The session registry uses a tight polling budget so not-found paths
/// finish quickly; the notary resolver runs with the development key so
/// no network is touched.
pub async fn create_test_state(
    links: &[&str],
    proof_verifier: Arc<dyn ProofVerifier>,
    allow_unverified_claims: bool,
) -> AppState {
    let store = test_store(links).await;

    AppState {
        registry: Arc::new(SessionRegistry::new(2, Duration::from_millis(25))),
        engine: Arc::new(AllocationEngine::new(store)),
        verifier: Arc::new(AttestationVerifier::new(
            NotaryKeyResolver::new(true),
            proof_verifier,
            Arc::new(ScreenNameExtractor::new()),
        )),
        verified: Arc::new(VerifiedIdentities::new()),
        allow_unverified_claims,
    }
}

/// Create a test router with an optional registrar key.
pub fn create_test_router(state: AppState, registrar_auth: RegistrarAuth) -> axum::Router {
    build_router(registrar_auth)
        .expect("router assembly")
        .with_state(state)
}

/// A well-formed attestation body resolvable without network access.
pub fn test_attestation() -> Value {
    json!({
        "version": "0.1.0-alpha.7",
        "data": "deadbeef",
        "meta": {
            "notaryUrl": "wss://localhost:7047/notarize",
            "websocketProxyUrl": "ws://localhost:55688",
        }
    })
}

/// Send a request to the test router.
pub async fn send_request(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = bearer {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}
