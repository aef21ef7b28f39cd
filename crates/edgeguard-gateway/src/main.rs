//! Edgeguard gateway binary.
//!
//! All configuration comes from the environment; see [`GatewayConfig::from_env`]
//! and [`AuthConfig::from_env`].
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to accept unsigned test tokens of the form
//! `test-token:<email>:<role,role>` instead of verifying signatures.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(feature = "dev-mode"))]
use edgeguard_auth::{AuthConfig, TokenCodec};
#[cfg(feature = "dev-mode")]
use edgeguard_auth::MockTokenVerifier;
use edgeguard_auth::TokenVerifier;
use edgeguard_gateway::{create_router, GatewayConfig, GatewayState};
use edgeguard_store::{CounterStore, MemoryCounterStore, RedisCounterStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,edgeguard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting edgeguard gateway");

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        rate_limit_requests = config.rate_limit_requests,
        rate_limit_window_seconds = config.rate_limit_window_seconds,
        store_failure_policy = ?config.store_failure_policy,
        public_paths = ?config.public_paths,
        routes = config.routes.len(),
        "Gateway configuration loaded"
    );

    #[cfg(feature = "dev-mode")]
    let verifier: Arc<dyn TokenVerifier> = {
        tracing::warn!("DEV MODE ENABLED - token signatures are not checked");
        tracing::warn!("Use tokens in format: test-token:<email>:<role,role>");
        Arc::new(MockTokenVerifier)
    };

    #[cfg(not(feature = "dev-mode"))]
    let verifier: Arc<dyn TokenVerifier> = Arc::new(TokenCodec::new(&AuthConfig::from_env()?)?);
    tracing::info!("Token verifier initialized");

    let (store, store_backend): (Arc<dyn CounterStore>, &'static str) = match &config.redis_url {
        Some(url) => (Arc::new(RedisCounterStore::connect(url).await?), "redis"),
        None => {
            tracing::warn!("No REDIS_URL set - rate limits are enforced per instance only");
            (Arc::new(MemoryCounterStore::new()), "memory")
        }
    };

    if config.routes.is_empty() {
        tracing::warn!("No UPSTREAM_ROUTES set - every proxied request will return 404");
    }
    for route in &config.routes {
        tracing::info!(prefix = %route.prefix, upstream = %route.upstream, strip_prefix = route.strip_prefix, "Route registered");
    }

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::new(config, verifier, store, store_backend);
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
