//! The authentication gate.
//!
//! Classifies each request as public or protected, verifies the bearer token
//! on protected paths, and forwards the verified identity downstream as
//! headers. Client-supplied identity headers are always removed first, so a
//! backend can trust `X-User-Email` and `X-User-Roles` unconditionally.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use chrono::{DateTime, Utc};

use edgeguard_auth::TokenVerifier;
use edgeguard_core::{headers, Identity};

use crate::error::{AuthRejection, GatewayError};
use crate::pipeline::{Filter, Next, RequestContext};

/// Outcome of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Public path; forwarded without an identity.
    PassedPublic,
    /// The token verified.
    Authenticated(Identity),
    /// The path contains `.` or `..` segments and is refused before
    /// classification.
    InvalidPath,
    /// The request is refused.
    Rejected(AuthRejection),
}

/// Paths that bypass authentication.
#[derive(Debug, Clone, Default)]
pub struct PublicPaths {
    prefixes: Vec<String>,
    exact: Vec<String>,
}

impl PublicPaths {
    /// Build from configured entries. Entries ending in `/` match as prefixes,
    /// others match only the exact path.
    #[must_use]
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut paths = Self::default();
        for entry in entries {
            let entry = entry.into();
            if entry.ends_with('/') {
                paths.prefixes.push(entry);
            } else {
                paths.exact.push(entry);
            }
        }
        paths
    }

    /// Whether `path` is public.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.exact.iter().any(|p| p == path) || self.prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// The authentication filter.
pub struct AuthenticationGate {
    verifier: Arc<dyn TokenVerifier>,
    public_paths: PublicPaths,
}

impl AuthenticationGate {
    /// Create a gate that verifies tokens with `verifier`.
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>, public_paths: PublicPaths) -> Self {
        Self {
            verifier,
            public_paths,
        }
    }

    /// Decide what to do with a request, without side effects.
    #[must_use]
    pub fn decide(&self, path: &str, headers: &HeaderMap, now: DateTime<Utc>) -> GateDecision {
        if has_dot_segment(path) {
            return GateDecision::InvalidPath;
        }
        if self.public_paths.matches(path) {
            return GateDecision::PassedPublic;
        }

        let Some(token) = bearer_token(headers) else {
            return GateDecision::Rejected(AuthRejection::MissingCredentials);
        };

        match self.verifier.verify(token, now) {
            Ok(identity) => GateDecision::Authenticated(identity),
            Err(err) => {
                tracing::debug!(path = %path, error = %err, "Token verification failed");
                GateDecision::Rejected(AuthRejection::InvalidToken)
            }
        }
    }
}

/// Whether `path` has a `.` or `..` segment, also in percent-encoded form.
///
/// Such paths would be matched against public prefixes as written but
/// resolved by the HTTP client before forwarding.
fn has_dot_segment(path: &str) -> bool {
    let decoded = path
        .to_ascii_lowercase()
        .replace("%2e", ".")
        .replace("%2f", "/")
        .replace("%5c", "/");
    decoded
        .split(['/', '\\'])
        .any(|segment| segment == "." || segment == "..")
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-sensitively.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(headers::BEARER_PREFIX))
}

/// Remove identity headers a client may have sent.
fn strip_identity_headers(headers: &mut HeaderMap) {
    headers.remove(headers::USER_EMAIL);
    headers.remove(headers::USER_ROLES);
}

/// Write the verified identity into the forwarded headers.
fn inject_identity(headers: &mut HeaderMap, identity: &Identity) -> Option<()> {
    let email = HeaderValue::from_str(identity.email()).ok()?;
    let roles = HeaderValue::from_str(&identity.roles_header()).ok()?;
    headers.insert(headers::USER_EMAIL, email);
    headers.insert(headers::USER_ROLES, roles);
    Some(())
}

#[async_trait]
impl Filter for AuthenticationGate {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        strip_identity_headers(ctx.headers_mut());

        let rejection = match self.decide(ctx.path(), ctx.headers(), Utc::now()) {
            GateDecision::PassedPublic => return next.run(ctx).await,
            GateDecision::InvalidPath => {
                tracing::warn!(path = %ctx.path(), "Refusing path with dot segments");
                return GatewayError::InvalidPath.into_response_for(ctx.path());
            }
            GateDecision::Authenticated(identity) => {
                if inject_identity(ctx.headers_mut(), &identity).is_some() {
                    ctx.set_identity(identity);
                    return next.run(ctx).await;
                }
                tracing::debug!("Verified identity cannot be encoded as headers");
                AuthRejection::InvalidToken
            }
            GateDecision::Rejected(rejection) => rejection,
        };

        GatewayError::Unauthenticated(rejection).into_response_for(ctx.path())
    }
}
