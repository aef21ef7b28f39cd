//! Gateway error types and responses.
//!
//! Every terminal response the gateway produces on its own (rejections,
//! fallbacks, missing routes) is an RFC 7807 problem detail.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use edgeguard_core::{ProblemDetail, FALLBACK_PROBLEM_BODY};

/// Why the authentication gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization` header, or one without the `Bearer ` scheme.
    MissingCredentials,
    /// The bearer token failed verification.
    InvalidToken,
}

impl AuthRejection {
    /// The message sent to the client.
    #[must_use]
    pub const fn detail(self) -> &'static str {
        match self {
            Self::MissingCredentials => "Missing or invalid Authorization header",
            Self::InvalidToken => "Invalid or expired token",
        }
    }
}

/// Gateway error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The caller could not be authenticated.
    #[error("{}", .0.detail())]
    Unauthenticated(AuthRejection),

    /// The caller exceeded its quota for the current window.
    #[error("Rate limit exceeded. Try again later.")]
    RateLimitExceeded,

    /// A backend or the counter store could not serve the request.
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// No route handles the path.
    #[error("{0}")]
    NotFound(String),

    /// The request body exceeded the configured limit.
    #[error("Request body is too large")]
    PayloadTooLarge,

    /// The path contains dot segments.
    #[error("Request path must not contain '.' or '..' segments")]
    InvalidPath,

    /// The request did not complete within the request timeout.
    #[error("The request took too long to complete")]
    Timeout,
}

impl GatewayError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidPath => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Build the problem detail for this error.
    #[must_use]
    pub fn to_problem(&self) -> ProblemDetail {
        let status = self.status_code();
        let title = status.canonical_reason().unwrap_or("Error");
        ProblemDetail::new(status.as_u16(), title, self.to_string())
    }

    /// Render this error as a response whose `instance` is the request path.
    #[must_use]
    pub fn into_response_for(self, path: &str) -> Response {
        problem_response(&self.to_problem().with_instance(path))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        problem_response(&self.to_problem())
    }
}

/// Serialize a problem detail into a JSON response.
///
/// If serialization fails the minimal hardcoded 500 body is sent instead.
#[must_use]
pub fn problem_response(problem: &ProblemDetail) -> Response {
    let (status, body) = match problem.to_json() {
        Ok(body) => (
            StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Body::from(body),
        ),
        Err(err) => {
            tracing::error!(error = %err, "Failed to serialize problem detail");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Body::from(FALLBACK_PROBLEM_BODY),
            )
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
