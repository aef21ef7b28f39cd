//! Issuer application state.

use std::sync::Arc;

use crate::service::AuthService;

/// Shared application state for the issuer.
#[derive(Clone)]
pub struct IssuerState {
    /// Registration and login use cases.
    pub service: Arc<AuthService>,
}

impl IssuerState {
    /// Wrap a service for sharing across handlers.
    #[must_use]
    pub fn new(service: AuthService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
