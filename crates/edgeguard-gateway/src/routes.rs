//! Router configuration.
//!
//! The gateway answers `/health` itself; every other path goes through the
//! filter pipeline and on to an upstream.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::health;
use crate::pipeline::RequestContext;
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// - `GET /health` - Local health check
/// - everything else - authenticated, rate limited, and proxied
pub fn create_router(state: GatewayState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    // Request timeout is enforced by the pipeline.
    Router::new()
        .route("/health", get(health::health))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// Hand the request to the pipeline.
async fn proxy(
    State(state): State<GatewayState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let remote_addr = connect_info.map(|ConnectInfo(addr)| addr);
    state
        .pipeline
        .handle(RequestContext::from_request(request, remote_addr))
        .await
}
