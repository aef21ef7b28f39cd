//! Gateway application state.
//!
//! The state is assembled once at startup from the configuration and the
//! chosen collaborators, then shared by every request.

use std::sync::Arc;

use edgeguard_auth::TokenVerifier;
use edgeguard_store::CounterStore;

use crate::auth::{AuthenticationGate, PublicPaths};
use crate::config::GatewayConfig;
use crate::pipeline::{Pipeline, Upstream};
use crate::proxy::HttpUpstream;
use crate::rate_limit::RateLimiter;

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct GatewayState {
    /// The filter pipeline every proxied request runs through.
    pub pipeline: Arc<Pipeline>,
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// Which counter store backs the rate limiter, for the health endpoint.
    pub store_backend: &'static str,
}

impl GatewayState {
    /// Assemble the state with an HTTP upstream built from the configured
    /// routes.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn CounterStore>,
        store_backend: &'static str,
    ) -> Self {
        let upstream = Arc::new(HttpUpstream::new(
            config.routes.clone(),
            config.upstream_retries,
            config.request_timeout(),
        ));
        Self::with_upstream(config, verifier, store, store_backend, upstream)
    }

    /// Assemble the state around an arbitrary upstream.
    #[must_use]
    pub fn with_upstream(
        config: GatewayConfig,
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn CounterStore>,
        store_backend: &'static str,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        let gate = AuthenticationGate::new(verifier, PublicPaths::new(config.public_paths.clone()));
        let limiter = RateLimiter::from_config(store, &config);

        // Authentication must run first so the limiter can key on the identity.
        let pipeline = Pipeline::new(upstream)
            .with_filter(Arc::new(gate))
            .with_filter(Arc::new(limiter))
            .with_timeout(config.request_timeout());

        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            store_backend,
        }
    }
}
