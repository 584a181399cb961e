//! HTTP server bootstrap for the attested-rewards service.
//!
//! This module wires together:
//! - configuration
//! - the SQLite reward store and migrations
//! - core services (session registry, allocation engine, attestation verifier)
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::attestation::AttestationVerifier;
use crate::auth::RegistrarAuth;
use crate::domain::PoolEntry;
use crate::infra::{
    AllocationEngine, RewardStore, SessionRegistry, SqliteRewardStore, VerifiedIdentities,
    DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL,
};
use crate::notary::NotaryKeyResolver;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file for the reward store.
    pub database_path: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Optional newline-separated reward links file to seed the pool from.
    pub pool_file: Option<String>,
    /// Session polling budget.
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// Loopback notaries resolve to the pinned development key.
    pub allow_dev_notary_key: bool,
    /// Reduced-trust mode: accept claims for unverified identities.
    pub allow_unverified_claims: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "rewards.db".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .expect("Invalid listen address");

        let pool_file = std::env::var("POOL_FILE").ok().filter(|p| !p.is_empty());

        let poll_attempts: u32 = std::env::var("SESSION_POLL_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_POLL_ATTEMPTS);

        let poll_interval = std::env::var("SESSION_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        Self {
            database_path,
            listen_addr,
            pool_file,
            poll_attempts,
            poll_interval,
            allow_dev_notary_key: env_flag("ALLOW_DEV_NOTARY_KEY"),
            allow_unverified_claims: env_flag("ALLOW_UNVERIFIED_CLAIMS"),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on"))
        .unwrap_or(false)
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub engine: Arc<AllocationEngine<SqliteRewardStore>>,
    pub verifier: Arc<AttestationVerifier>,
    pub verified: Arc<VerifiedIdentities>,
    pub allow_unverified_claims: bool,
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting attested-rewards v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Database path: {}", config.database_path);
    info!(
        "  Session polling budget: {} x {:?}",
        config.poll_attempts, config.poll_interval
    );

    let store = SqliteRewardStore::from_path(&config.database_path).await?;
    store.initialize().await?;
    info!("Reward store migrations applied");

    if let Some(pool_file) = &config.pool_file {
        let inserted = seed_pool_from_file(&store, pool_file).await?;
        info!("Seeded {} pool entries from {}", inserted, pool_file);
    }

    let remaining = store.pool_size().await?;
    info!("Reward pool holds {} unassigned entries", remaining);

    let registrar_auth = RegistrarAuth::from_env();
    if registrar_auth.is_enabled() {
        info!("Registrar key is configured; session registration requires it");
    } else {
        warn!("No registrar key configured; session registration is open");
    }

    if config.allow_dev_notary_key {
        warn!("Development notary key enabled for loopback notaries");
    }
    if config.allow_unverified_claims {
        warn!("Reduced-trust mode: claims accepted for unverified identities");
    }

    let resolver = NotaryKeyResolver::new(config.allow_dev_notary_key);

    let state = AppState {
        registry: Arc::new(SessionRegistry::new(
            config.poll_attempts,
            config.poll_interval,
        )),
        engine: Arc::new(AllocationEngine::new(store)),
        verifier: Arc::new(AttestationVerifier::with_tlsn(resolver)),
        verified: Arc::new(VerifiedIdentities::new()),
        allow_unverified_claims: config.allow_unverified_claims,
    };

    let app = build_router(registrar_auth)?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("attested-rewards is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Seed the reward pool from a newline-separated links file.
///
/// Entry keys are derived from link content, so re-seeding the same file
/// is a no-op.
pub async fn seed_pool_from_file(store: &SqliteRewardStore, path: &str) -> anyhow::Result<u64> {
    let content = tokio::fs::read_to_string(path).await?;
    let entries: Vec<PoolEntry> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PoolEntry::from_link)
        .collect();

    Ok(store.add_pool_entries(&entries).await?)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Assemble the full router (API + registrar + health probes).
pub fn build_router(registrar_auth: RegistrarAuth) -> anyhow::Result<Router<AppState>> {
    let registrar = crate::api::registrar_router().layer(axum::middleware::from_fn_with_state(
        registrar_auth,
        crate::auth::registrar_middleware,
    ));

    let mut router = Router::new()
        .nest("/api", crate::api::router())
        .nest("/api", registrar)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    ))
}

/// Health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "attested-rewards",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, (axum::http::StatusCode, String)> {
    // Check store connectivity by reading the pool size.
    match state.engine.remaining().await {
        Ok(remaining) => Ok(axum::Json(serde_json::json!({
            "status": "ready",
            "database": "connected",
            "pool_remaining": remaining,
        }))),
        Err(e) => Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            format!("Store unavailable: {}", e),
        )),
    }
}
