//! Verified caller identity and rate-limit partition keys.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Prefix for keys derived from the caller's network origin.
///
/// Identity subjects may not start with this prefix, which keeps the two key
/// spaces disjoint.
pub const ORIGIN_KEY_PREFIX: &str = "ip:";

/// The verified result of decoding an access token.
///
/// An `Identity` only lives for the duration of one request. Roles keep the
/// order they had in the token claims, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    email: String,
    roles: Vec<String>,
}

impl Identity {
    /// Build an identity from a subject and its roles.
    ///
    /// Empty role names are dropped.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIdentity` if the subject is blank or starts
    /// with [`ORIGIN_KEY_PREFIX`], and `CoreError::InvalidRole` if a role
    /// contains a comma.
    pub fn new<I, R>(email: impl Into<String>, roles: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let email = email.into();
        if email.trim().is_empty() {
            return Err(CoreError::InvalidIdentity("empty subject".to_string()));
        }
        if email.starts_with(ORIGIN_KEY_PREFIX) {
            return Err(CoreError::InvalidIdentity(format!(
                "subject may not start with {ORIGIN_KEY_PREFIX:?}"
            )));
        }

        let mut ordered: Vec<String> = Vec::new();
        for role in roles {
            let role = role.into();
            if role.contains(',') {
                return Err(CoreError::InvalidRole(role));
            }
            if !role.is_empty() && !ordered.contains(&role) {
                ordered.push(role);
            }
        }

        Ok(Self {
            email,
            roles: ordered,
        })
    }

    /// The verified email (the token subject).
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// The verified roles, in claim order.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Whether the identity carries the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// The comma-joined role list forwarded downstream.
    #[must_use]
    pub fn roles_header(&self) -> String {
        self.roles.join(",")
    }
}

/// The partition key under which request counts are tracked.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    /// Key for an authenticated caller: the verified email.
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        Self(identity.email().to_string())
    }

    /// Key for an anonymous caller: `ip:<address>`, or `ip:unknown` when the
    /// remote address is not available.
    #[must_use]
    pub fn for_origin(addr: Option<IpAddr>) -> Self {
        match addr {
            Some(ip) => Self(format!("{ORIGIN_KEY_PREFIX}{ip}")),
            None => Self(format!("{ORIGIN_KEY_PREFIX}unknown")),
        }
    }

    /// Resolve the key for a request: identity first, origin otherwise.
    #[must_use]
    pub fn resolve(identity: Option<&Identity>, addr: Option<IpAddr>) -> Self {
        identity.map_or_else(|| Self::for_origin(addr), Self::for_identity)
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RateLimitKey({})", self.0)
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RateLimitKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
