//! Local health endpoint.
//!
//! Answered by the gateway itself; it does not pass through the pipeline and
//! is not rate limited.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Counter store backing the rate limiter (`redis` or `memory`).
    pub rate_limit_store: &'static str,
    /// Number of configured upstream routes.
    pub routes: usize,
}

/// `GET /health`
///
/// ```text
/// 200 OK
/// { "status": "UP", "version": "0.1.0", "rateLimitStore": "redis", "routes": 2 }
/// ```
pub async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "UP",
        version: env!("CARGO_PKG_VERSION"),
        rate_limit_store: state.store_backend,
        routes: state.config.routes.len(),
    };

    (StatusCode::OK, Json(response))
}
