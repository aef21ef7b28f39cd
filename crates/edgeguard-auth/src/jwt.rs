//! Token issuance and verification.
//!
//! Tokens are compact JWS strings signed with HS256. The payload carries the
//! subject (the caller's email), the token kind (`typ`), the roles for access
//! tokens, and the `iat`/`exp` timestamps in epoch seconds.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use edgeguard_core::Identity;

use crate::error::{AuthError, Result, VerificationError};
use crate::{AuthConfig, MIN_SECRET_BYTES};

/// Which kind of token to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, carries roles, presented to the gateway.
    Access,
    /// Long-lived, carries only the subject.
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// The token pair handed to a client after login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Access token for the `Authorization` header.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Always `Bearer`.
    pub token_type: String,
}

/// Trait for verifying access tokens.
///
/// Verification is pure computation, so the trait is synchronous.
pub trait TokenVerifier: Send + Sync {
    /// Verify an access token at the given instant and return the identity it
    /// carries.
    ///
    /// # Errors
    ///
    /// Returns a `VerificationError` if the token cannot be decoded, its
    /// signature does not match, it is not an access token, or `now` is at or
    /// past its expiry.
    fn verify(&self, token: &str, now: DateTime<Utc>)
        -> std::result::Result<Identity, VerificationError>;
}

/// Claims as they appear on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    typ: TokenKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

/// HS256 token codec.
///
/// Holds the signing keys and lifetimes; cheap to share behind an `Arc`.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenCodec {
    /// Create a codec from the shared configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakSecret` if the secret is shorter than
    /// [`MIN_SECRET_BYTES`], or `AuthError::Config` if a lifetime is out of range.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let secret = config.secret.as_bytes();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AuthError::WeakSecret { len: secret.len() });
        }

        let access_ttl = chrono::Duration::from_std(config.access_token_ttl())
            .map_err(|e| AuthError::Config(format!("access token lifetime: {e}")))?;
        let refresh_ttl = chrono::Duration::from_std(config.refresh_token_ttl())
            .map_err(|e| AuthError::Config(format!("refresh token lifetime: {e}")))?;

        // Expiry is checked against the caller-supplied clock, not the system clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        })
    }

    /// The configured lifetime for a token kind.
    #[must_use]
    pub const fn lifetime(&self, kind: TokenKind) -> chrono::Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Issue a signed token.
    ///
    /// Roles are only embedded in access tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidClaims` if the subject or a role is invalid,
    /// or `AuthError::Encoding` if signing fails.
    pub fn issue<I, R>(
        &self,
        subject: &str,
        roles: I,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let identity = Identity::new(subject, roles)?;
        let roles = match kind {
            TokenKind::Access => identity.roles().to_vec(),
            TokenKind::Refresh => Vec::new(),
        };

        let claims = Claims {
            sub: identity.email().to_string(),
            typ: kind,
            roles,
            iat: now.timestamp(),
            exp: (now + self.lifetime(kind)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// Issue an access/refresh pair for a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if either token cannot be issued.
    pub fn issue_pair<I, R>(&self, subject: &str, roles: I, now: DateTime<Utc>) -> Result<TokenPair>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let access_token = self.issue(subject, roles, TokenKind::Access, now)?;
        let refresh_token = self.issue(subject, Vec::<String>::new(), TokenKind::Refresh, now)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
        })
    }
}

impl TokenCodec {
    /// Verify a token of the expected kind.
    ///
    /// # Errors
    ///
    /// Returns a `VerificationError` if the token cannot be decoded, its
    /// signature does not match, its kind differs from `expected`, or `now`
    /// is at or past its expiry.
    pub fn verify_as(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> std::result::Result<Identity, VerificationError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    VerificationError::BadSignature
                }
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                _ => VerificationError::MalformedToken(e.to_string()),
            }
        })?;

        let claims = data.claims;
        if now.timestamp() >= claims.exp {
            return Err(VerificationError::Expired);
        }
        if claims.typ != expected {
            return Err(VerificationError::WrongKind {
                expected,
                found: claims.typ,
            });
        }

        Identity::new(claims.sub, claims.roles)
            .map_err(|e| VerificationError::MalformedToken(e.to_string()))
    }
}

impl TokenVerifier for TokenCodec {
    fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Identity, VerificationError> {
        self.verify_as(token, TokenKind::Access, now)
    }
}

/// A mock token verifier for testing.
///
/// Accepts tokens of the form `test-token:<email>:<role,role>` and rejects
/// everything else as malformed. The literal `expired-token` is reported as
/// expired.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockTokenVerifier;

#[cfg(any(test, feature = "test-utils"))]
impl TokenVerifier for MockTokenVerifier {
    fn verify(
        &self,
        token: &str,
        _now: DateTime<Utc>,
    ) -> std::result::Result<Identity, VerificationError> {
        if token == "expired-token" {
            return Err(VerificationError::Expired);
        }

        let rest = token.strip_prefix("test-token:").ok_or_else(|| {
            VerificationError::MalformedToken("expected test-token:<email>:<roles>".to_string())
        })?;

        let (email, roles) = rest.split_once(':').unwrap_or((rest, ""));
        Identity::new(email, roles.split(','))
            .map_err(|e| VerificationError::MalformedToken(e.to_string()))
    }
}
