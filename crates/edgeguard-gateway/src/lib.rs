//! Authenticating, rate-limiting edge gateway.
//!
//! The gateway sits in front of internal services. For every request it:
//!
//! - authenticates the bearer token (unless the path is public) and forwards
//!   the verified identity as `X-User-Email` / `X-User-Roles`
//! - counts the request against a per-caller quota in a shared counter store
//!   and reports the quota in `X-RateLimit-*` headers
//! - forwards admitted requests to the backend that owns the path
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Clients                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     edgeguard-gateway                       │
//! │  ┌──────────────┐   ┌──────────────┐   ┌────────────────┐   │
//! │  │    Auth      │──▶│    Rate      │──▶│     HTTP       │   │
//! │  │    Gate      │   │   Limiter    │   │   Upstream     │   │
//! │  └──────────────┘   └──────┬───────┘   └───────┬────────┘   │
//! └────────────────────────────┼───────────────────┼────────────┘
//!                              ▼                   ▼
//!                       ┌──────────────┐    ┌──────────────┐
//!                       │Counter store │    │   Backends   │
//!                       │   (Redis)    │    │              │
//!                       └──────────────┘    └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use edgeguard_auth::{AuthConfig, TokenCodec};
//! use edgeguard_gateway::{create_router, GatewayConfig, GatewayState};
//! use edgeguard_store::RedisCounterStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let codec = TokenCodec::new(&AuthConfig::from_env()?)?;
//! let store = RedisCounterStore::connect("redis://127.0.0.1:6379").await?;
//!
//! let state = GatewayState::new(config, Arc::new(codec), Arc::new(store), "redis");
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(
//!     listener,
//!     app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod proxy;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use auth::{AuthenticationGate, GateDecision, PublicPaths};
pub use config::{ConfigError, FailurePolicy, GatewayConfig, RouteConfig};
pub use error::{AuthRejection, GatewayError};
pub use pipeline::{Filter, Next, Pipeline, RequestContext, Upstream};
pub use proxy::HttpUpstream;
pub use rate_limit::{RateLimitStatus, RateLimiter};
pub use routes::create_router;
pub use state::GatewayState;
