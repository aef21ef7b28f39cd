//! Authentication error types.

use thiserror::Error;

use crate::jwt::TokenKind;
use crate::MIN_SECRET_BYTES;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why a token failed verification.
///
/// The gateway collapses all of these into a single "unauthenticated" answer;
/// the distinction exists for logging and tests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// The string is not a decodable token.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The signature does not match the shared secret.
    #[error("bad signature")]
    BadSignature,

    /// The token is past its expiry.
    #[error("token expired")]
    Expired,

    /// The token is valid but of the wrong kind.
    #[error("expected {expected} token, got {found} token")]
    WrongKind {
        /// The kind the caller asked for.
        expected: TokenKind,
        /// The kind found in the token.
        found: TokenKind,
    },
}

/// Errors that can occur while configuring the codec or issuing tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A token failed verification.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// The signing secret is too short for HS256.
    #[error("signing secret is {len} bytes, at least {MIN_SECRET_BYTES} required")]
    WeakSecret {
        /// Length of the rejected secret in bytes.
        len: usize,
    },

    /// The subject or roles cannot be put into a token.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// Signing the token failed.
    #[error("token encoding failed: {0}")]
    Encoding(String),

    /// A configuration value could not be read.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Verification(_) => 401,
            Self::WeakSecret { .. }
            | Self::InvalidClaims(_)
            | Self::Encoding(_)
            | Self::Config(_) => 500,
        }
    }
}

impl From<edgeguard_core::CoreError> for AuthError {
    fn from(err: edgeguard_core::CoreError) -> Self {
        Self::InvalidClaims(err.to_string())
    }
}
