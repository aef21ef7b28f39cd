//! Issuer error types and responses.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use edgeguard_auth::AuthError;
use edgeguard_core::{ProblemDetail, FALLBACK_PROBLEM_BODY};

/// A result type using `IssuerError`.
pub type Result<T> = std::result::Result<T, IssuerError>;

/// Errors returned by the issuer.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// The email is already registered.
    #[error("User with email {0} already exists")]
    UserAlreadyExists(String),

    /// Unknown email or wrong password; both render the same response.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The request body failed validation.
    #[error("Validation failed for one or more fields")]
    Validation(Vec<String>),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// Token issuance failed.
    #[error("token error: {0}")]
    Token(#[from] AuthError),
}

impl IssuerError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UserAlreadyExists(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Hashing(_) | Self::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the problem detail for this error.
    #[must_use]
    pub fn to_problem(&self) -> ProblemDetail {
        let status = self.status_code().as_u16();
        match self {
            Self::UserAlreadyExists(_) => {
                ProblemDetail::new(status, "User Already Exists", self.to_string())
                    .with_type("/errors/user-already-exists")
            }
            Self::InvalidCredentials => {
                ProblemDetail::new(status, "Authentication Failed", self.to_string())
                    .with_type("/errors/invalid-credentials")
            }
            Self::Validation(errors) => {
                ProblemDetail::new(status, "Validation Error", self.to_string())
                    .with_type("/errors/validation-failed")
                    .with_errors(errors.clone())
            }
            Self::Hashing(_) | Self::Token(_) => {
                tracing::error!(error = %self, "Issuer internal error");
                ProblemDetail::new(status, "Internal Server Error", "An unexpected error occurred")
            }
        }
    }
}

impl IntoResponse for IssuerError {
    fn into_response(self) -> Response {
        let problem = self.to_problem();
        let (status, body) = match problem.to_json() {
            Ok(body) => (self.status_code(), Body::from(body)),
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
}
