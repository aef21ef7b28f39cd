//! HTTP handlers for `/auth/*`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use edgeguard_auth::TokenPair;

use crate::error::{IssuerError, Result};
use crate::service::{LoginRequest, RegisterRequest};
use crate::state::IssuerState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `UP` while the process serves requests.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
}

/// Unwrap a JSON body, reporting malformed input as a validation failure.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| IssuerError::Validation(vec![rejection.body_text()]))
}

/// Register a user and sign them in.
///
/// POST /auth/register
///
/// # Errors
///
/// 400 for invalid input, 409 if the email is taken.
pub async fn register(
    State(state): State<IssuerState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenPair>)> {
    let request = body(payload)?.normalized()?;
    let email = request.email.clone();
    let password = request.password.clone();

    state.service.register(request).await?;
    let tokens = state.service.login(&email, &password).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

/// Exchange credentials for a token pair.
///
/// POST /auth/login
///
/// # Errors
///
/// 400 for invalid input, 401 for bad credentials.
pub async fn login(
    State(state): State<IssuerState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>> {
    let request = body(payload)?.normalized()?;
    let tokens = state
        .service
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(tokens))
}

/// GET /auth/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        service: "edgeguard-issuer",
    })
}
