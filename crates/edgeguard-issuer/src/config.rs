//! Issuer configuration.

use edgeguard_auth::{AuthConfig, AuthError};

/// Default bind address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8081";

/// Issuer configuration.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: String,
    /// Token signing settings, shared with the gateway.
    pub auth: AuthConfig,
}

impl IssuerConfig {
    /// Create a configuration with the default bind address.
    #[must_use]
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            auth,
        }
    }

    /// Load from `LISTEN_ADDR` plus the token variables read by
    /// [`AuthConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or a lifetime is not a
    /// positive integer.
    pub fn from_env() -> Result<Self, AuthError> {
        let mut config = Self::new(AuthConfig::from_env()?);
        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        Ok(config)
    }
}
