//! REST API endpoints for the attested-rewards service.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::error::{validation_error, ApiError};
use crate::domain::{Attestation, Identity, SessionId};
use crate::infra::ServiceError;
use crate::server::AppState;

/// Build the `/api` router for client-facing operations.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions/redeem", post(redeem_session))
        .route("/v1/attestations/verify", post(verify_attestation))
        .route("/v1/rewards/claim", post(claim_reward))
        .route("/v1/rewards/status", get(reward_status))
}

/// Routes called by the out-of-band proof-producing actor.
///
/// Mounted separately so the registrar key middleware covers exactly
/// these.
pub fn registrar_router() -> Router<AppState> {
    Router::new().route("/v1/sessions", post(register_session))
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Deserialize)]
struct RegisterSessionRequest {
    session_id: String,
    identity: String,
}

#[derive(Debug, Serialize)]
struct RegisterSessionResponse {
    status: &'static str,
    session_id: String,
}

async fn register_session(
    State(state): State<AppState>,
    Json(request): Json<RegisterSessionRequest>,
) -> Result<Json<RegisterSessionResponse>, ApiError> {
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(validation_error("session_id", "session_id must not be empty"));
    }

    let identity = request.identity.trim();
    if identity.is_empty() {
        return Err(validation_error("identity", "identity must not be empty"));
    }

    state
        .registry
        .put(SessionId::from(session_id), Identity::from(identity));

    Ok(Json(RegisterSessionResponse {
        status: "registered",
        session_id: session_id.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct RedeemSessionRequest {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct RedeemSessionResponse {
    identity: Identity,
}

async fn redeem_session(
    State(state): State<AppState>,
    Json(request): Json<RedeemSessionRequest>,
) -> Result<Json<RedeemSessionResponse>, ApiError> {
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(validation_error("session_id", "session_id must not be empty"));
    }

    let identity = state.registry.take(&SessionId::from(session_id)).await?;

    // A redeemed identity came from the prover, so it counts as verified
    // for the claim gate.
    state.verified.mark(identity.clone()).await;

    Ok(Json(RedeemSessionResponse { identity }))
}

// ============================================================================
// Attestations
// ============================================================================

#[derive(Debug, Serialize)]
struct VerifyAttestationResponse {
    sent: String,
    recv: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<Identity>,
}

async fn verify_attestation(
    State(state): State<AppState>,
    Json(attestation): Json<Attestation>,
) -> Result<Json<VerifyAttestationResponse>, ApiError> {
    let transcript = state.verifier.verify(&attestation).await?;

    let identity = state.verifier.extract_identity(&transcript);
    match &identity {
        Some(identity) => {
            tracing::info!(%identity, "identity proven by attestation");
            state.verified.mark(identity.clone()).await;
        }
        None => {
            tracing::warn!("verified transcript contained no extractable identity");
        }
    }

    Ok(Json(VerifyAttestationResponse {
        sent: transcript.sent,
        recv: transcript.recv,
        identity,
    }))
}

// ============================================================================
// Rewards
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClaimRewardRequest {
    identity: String,
}

#[derive(Debug, Serialize)]
struct ClaimRewardResponse {
    identity: Identity,
    link: String,
    assigned_at: chrono::DateTime<chrono::Utc>,
}

async fn claim_reward(
    State(state): State<AppState>,
    Json(request): Json<ClaimRewardRequest>,
) -> Result<Json<ClaimRewardResponse>, ApiError> {
    let identity = request.identity.trim();
    if identity.is_empty() {
        return Err(validation_error("identity", "identity must not be empty"));
    }
    let identity = Identity::from(identity);

    // Claims are only reachable with an identity this process produced
    // through verification or redemption, unless the deployment runs in
    // the explicit reduced-trust mode.
    if !state.allow_unverified_claims && !state.verified.contains(&identity).await {
        return Err(ServiceError::IdentityUnverified(identity).into());
    }

    let assignment = state.engine.assign(&identity).await?;

    Ok(Json(ClaimRewardResponse {
        identity: assignment.identity,
        link: assignment.link,
        assigned_at: assignment.assigned_at,
    }))
}

#[derive(Debug, Serialize)]
struct RewardStatusResponse {
    remaining: u64,
}

async fn reward_status(
    State(state): State<AppState>,
) -> Result<Json<RewardStatusResponse>, ApiError> {
    let remaining = state.engine.remaining().await?;
    Ok(Json(RewardStatusResponse { remaining }))
}
