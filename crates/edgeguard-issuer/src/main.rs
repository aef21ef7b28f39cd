//! Edgeguard issuer binary.
//!
//! Accounts are kept in memory and lost on restart.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edgeguard_auth::TokenCodec;
use edgeguard_issuer::{create_router, AuthService, InMemoryCredentialStore, IssuerConfig, IssuerState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,edgeguard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting edgeguard issuer");

    let config = IssuerConfig::from_env()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        access_token_ttl_seconds = config.auth.access_token_ttl_seconds,
        refresh_token_ttl_seconds = config.auth.refresh_token_ttl_seconds,
        "Issuer configuration loaded"
    );

    let codec = Arc::new(TokenCodec::new(&config.auth)?);
    let service = AuthService::new(Arc::new(InMemoryCredentialStore::new()), codec);
    let app = create_router(IssuerState::new(service));

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
