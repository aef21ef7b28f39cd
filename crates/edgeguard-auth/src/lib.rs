//! Signed identity tokens for edgeguard.
//!
//! This crate is the only place tokens are created or checked:
//!
//! - [`TokenCodec`] issues and verifies HS256-signed access and refresh tokens
//! - [`TokenVerifier`] is the seam the gateway depends on
//! - [`MockTokenVerifier`] (feature `test-utils`) accepts plain test tokens
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  issue   ┌──────────────────┐
//! │   Issuer         │─────────▶│   TokenCodec     │
//! │   (login)        │          │   (HS256)        │
//! └──────────────────┘          └────────▲─────────┘
//!                                        │ verify
//!                               ┌────────┴─────────┐
//!                               │  TokenVerifier   │
//!                               │  (trait)         │
//!                               └────────▲─────────┘
//!                                        │
//!                               ┌────────┴─────────┐
//!                               │   Gateway        │
//!                               │   (auth gate)    │
//!                               └──────────────────┘
//! ```
//!
//! The issuer and every gateway instance must be configured with the same
//! secret; nothing checks this at runtime, verification simply fails.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use edgeguard_auth::{AuthConfig, TokenCodec, TokenKind, TokenVerifier};
//!
//! let codec = TokenCodec::new(&AuthConfig::new("0123456789abcdef0123456789abcdef")).unwrap();
//! let now = Utc::now();
//!
//! let token = codec.issue("alice@example.com", ["USER"], TokenKind::Access, now).unwrap();
//! let identity = codec.verify(&token, now).unwrap();
//!
//! assert_eq!(identity.email(), "alice@example.com");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod jwt;

use std::fmt;
use std::time::Duration;

pub use error::{AuthError, Result, VerificationError};
pub use jwt::{TokenCodec, TokenKind, TokenPair, TokenVerifier};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockTokenVerifier;

/// Minimum signing secret length in bytes (256 bits for HS256).
pub const MIN_SECRET_BYTES: usize = 32;

/// Token signing configuration shared by the issuer and the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Symmetric signing secret. Must be identical on every instance.
    pub secret: String,
    /// Access token lifetime, in seconds.
    pub access_token_ttl_seconds: u64,
    /// Refresh token lifetime, in seconds.
    pub refresh_token_ttl_seconds: u64,
}

impl AuthConfig {
    const DEFAULT_ACCESS_TTL: u64 = 30 * 60;
    const DEFAULT_REFRESH_TTL: u64 = 7 * 24 * 60 * 60;

    /// Create a configuration with the default lifetimes (30 minutes / 7 days).
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_ttl_seconds: Self::DEFAULT_ACCESS_TTL,
            refresh_token_ttl_seconds: Self::DEFAULT_REFRESH_TTL,
        }
    }

    /// Load from `JWT_SECRET`, `ACCESS_TOKEN_TTL_SECONDS` and
    /// `REFRESH_TOKEN_TTL_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if the secret is missing or a lifetime is
    /// not a number.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AuthError::Config("JWT_SECRET is not set".to_string()))?;

        let mut config = Self::new(secret);
        if let Some(ttl) = env_seconds("ACCESS_TOKEN_TTL_SECONDS")? {
            config.access_token_ttl_seconds = ttl;
        }
        if let Some(ttl) = env_seconds("REFRESH_TOKEN_TTL_SECONDS")? {
            config.refresh_token_ttl_seconds = ttl;
        }
        Ok(config)
    }

    /// Get the access token lifetime as a `Duration`.
    #[must_use]
    pub const fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_seconds)
    }

    /// Get the refresh token lifetime as a `Duration`.
    #[must_use]
    pub const fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_seconds)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .finish()
    }
}

fn env_seconds(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AuthError::Config(format!("{name} must be a number of seconds"))),
        Err(_) => Ok(None),
    }
}
