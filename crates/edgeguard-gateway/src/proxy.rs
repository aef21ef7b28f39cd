//! Forwarding admitted requests to backend services.
//!
//! Routes are matched by longest path prefix. Idempotent (`GET`) requests are
//! retried when the backend answers 502 or 503; when a backend cannot be
//! reached at all the client gets a 503 fallback problem instead of a raw
//! connection error.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;

use crate::config::RouteConfig;
use crate::error::GatewayError;
use crate::pipeline::{RequestContext, Upstream};

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Upstream that forwards over HTTP to the configured routes.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    routes: Vec<RouteConfig>,
    retries: u32,
}

impl HttpUpstream {
    /// Create an upstream for `routes`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(routes: Vec<RouteConfig>, retries: u32, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self::with_client(client, routes, retries)
    }

    /// Create an upstream with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, mut routes: Vec<RouteConfig>, retries: u32) -> Self {
        for route in &mut routes {
            route.upstream = route.upstream.trim_end_matches('/').to_string();
        }
        // Longest prefix first so the first match is the most specific.
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Self {
            client,
            routes,
            retries,
        }
    }

    /// Find the route for `path`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|route| prefix_matches(&route.prefix, path))
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let attempts = if *method == Method::GET {
            self.retries + 1
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            let result = self
                .client
                .request(method.clone(), url)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await;

            let retriable = match &result {
                Ok(response) => matches!(
                    response.status(),
                    StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE
                ),
                Err(err) => err.is_connect() || err.is_timeout(),
            };
            if !retriable || attempt >= attempts {
                return result;
            }

            tracing::debug!(url = %url, attempt, "Retrying upstream request");
            attempt += 1;
        }
    }
}

/// Whether the route prefix covers `path`, on segment boundaries.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Drop the first `strip` segments of `path`.
fn strip_segments(path: &str, strip: usize) -> String {
    if strip == 0 {
        return path.to_string();
    }
    let rest: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .skip(strip)
        .collect();
    format!("/{}", rest.join("/"))
}

/// Build the backend URL for a request.
fn target_url(route: &RouteConfig, path: &str, query: Option<&str>) -> String {
    let path = strip_segments(path, route.strip_prefix);
    match query {
        Some(query) => format!("{}{path}?{query}", route.upstream),
        None => format!("{}{path}", route.upstream),
    }
}

/// Copy headers minus hop-by-hop headers and those the client recomputes.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP {
        out.remove(name);
    }
    out.remove(header::HOST);
    out.remove(header::CONTENT_LENGTH);
    out
}

fn fallback(route: &RouteConfig, path: &str) -> Response {
    GatewayError::UpstreamUnavailable(format!(
        "{} service is currently unavailable. Please try again later.",
        route.name()
    ))
    .into_response_for(path)
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, ctx: &mut RequestContext) -> Response {
        let path = ctx.path().to_string();
        let Some(route) = self.resolve(&path) else {
            return GatewayError::NotFound(format!("No route for {path}")).into_response_for(&path);
        };

        let url = target_url(route, &path, ctx.query());
        let method = ctx.method().clone();
        let headers = forwardable_headers(ctx.headers());

        let Ok(body) = axum::body::to_bytes(ctx.take_body(), usize::MAX).await else {
            return GatewayError::PayloadTooLarge.into_response_for(&path);
        };

        let upstream = match self.send(&method, &url, &headers, &body).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(route = %route.prefix, error = %err, "Upstream unreachable");
                return fallback(route, &path);
            }
        };

        let status = upstream.status();
        if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE
        ) {
            tracing::warn!(route = %route.prefix, status = status.as_u16(), "Upstream unavailable after retries");
            return fallback(route, &path);
        }

        let response_headers = forwardable_headers(upstream.headers());
        let bytes = match upstream.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(route = %route.prefix, error = %err, "Upstream body read failed");
                return fallback(route, &path);
            }
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        response
    }
}
