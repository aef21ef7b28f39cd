//! Ordered request filters.
//!
//! A [`Pipeline`] runs an ordered list of [`Filter`]s and finally hands the
//! request to an [`Upstream`]. Each filter gets the mutable request context
//! and a [`Next`] continuation. Returning without calling `next.run` is a
//! short-circuit: later filters and the upstream are skipped.
//!
//! ```text
//! request ─▶ AuthenticationGate ─▶ RateLimiter ─▶ Upstream
//!                 │                     │             │
//! response ◀──────┴─────────────────────┴─────────────┘
//! ```

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use uuid::Uuid;

use edgeguard_core::Identity;

use crate::error::GatewayError;

/// Everything a filter may inspect or change about one request.
#[derive(Debug)]
pub struct RequestContext {
    request_id: Uuid,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    identity: Option<Identity>,
    body: Body,
}

impl RequestContext {
    /// Build a context from an inbound request and the peer address, if known.
    #[must_use]
    pub fn from_request(request: Request, remote_addr: Option<SocketAddr>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            request_id: Uuid::new_v4(),
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            remote_addr,
            identity: None,
            body,
        }
    }

    /// Unique id for log correlation.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers; changes are visible downstream.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// IP address of the peer.
    #[must_use]
    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.remote_addr.map(|addr| addr.ip())
    }

    /// Identity verified by the authentication gate, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Attach the verified identity.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Take the request body, leaving an empty one behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }
}

/// The final stage of the pipeline: produces the response for an admitted
/// request.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Produce the response for the request.
    async fn forward(&self, ctx: &mut RequestContext) -> Response;
}

/// A request filter.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Handle the request, either by calling `next.run(ctx)` or by returning a
    /// terminal response.
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response;
}

/// The rest of the pipeline after the current filter.
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    upstream: &'a dyn Upstream,
}

impl Next<'_> {
    /// Run the remaining filters and then the upstream.
    pub async fn run(self, ctx: &mut RequestContext) -> Response {
        match self.filters.split_first() {
            Some((filter, rest)) => {
                let next = Next {
                    filters: rest,
                    upstream: self.upstream,
                };
                filter.handle(ctx, next).await
            }
            None => self.upstream.forward(ctx).await,
        }
    }
}

/// An ordered chain of filters in front of an upstream.
#[derive(Clone)]
pub struct Pipeline {
    filters: Vec<Arc<dyn Filter>>,
    upstream: Arc<dyn Upstream>,
    timeout: Option<Duration>,
}

impl Pipeline {
    /// Create a pipeline with no filters.
    #[must_use]
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self {
            filters: Vec::new(),
            upstream,
            timeout: None,
        }
    }

    /// Bound the time a request may spend in the filters and the upstream.
    /// A request that runs over gets a 504 problem response.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append a filter; filters run in the order they are added.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Names of the filters, in execution order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run a request through the pipeline.
    ///
    /// Logs the request once on entry and once on completion, including
    /// requests that time out.
    pub async fn handle(&self, mut ctx: RequestContext) -> Response {
        let start = Instant::now();
        let request_id = ctx.request_id();
        let method = ctx.method().clone();
        let path = ctx.path().to_string();

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            remote_ip = ?ctx.remote_ip(),
            ">>> incoming"
        );

        let next = Next {
            filters: &self.filters,
            upstream: self.upstream.as_ref(),
        };
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, next.run(&mut ctx)).await,
            None => Ok(next.run(&mut ctx).await),
        };
        let response = outcome.unwrap_or_else(|_| {
            tracing::warn!(request_id = %request_id, path = %path, "Request timed out");
            GatewayError::Timeout.into_response_for(&path)
        });

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            latency_ms,
            "<<< completed"
        );

        response
    }
}
