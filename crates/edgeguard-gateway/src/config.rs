//! Gateway configuration types.
//!
//! The configuration is built once at startup, either from environment
//! variables ([`GatewayConfig::from_env`]) or deserialized, and handed to each
//! component.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// What to do when the counter store cannot be reached in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit the request and log a warning.
    #[default]
    FailOpen,
    /// Reject the request with 503.
    FailClosed,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_open" | "open" => Ok(Self::FailOpen),
            "fail_closed" | "closed" => Ok(Self::FailClosed),
            other => Err(format!("unknown failure policy {other:?}")),
        }
    }
}

/// One upstream route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    /// Path prefix handled by this route, e.g. `/api/orders`.
    pub prefix: String,
    /// Base URL of the backend, e.g. `http://orders:8080`.
    pub upstream: String,
    /// Number of leading path segments removed before forwarding.
    #[serde(default)]
    pub strip_prefix: usize,
}

impl RouteConfig {
    /// Short name used in fallback messages: the last segment of the prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        self.prefix
            .split('/')
            .rfind(|s| !s.is_empty())
            .unwrap_or("upstream")
    }
}

/// Parses `prefix=url` or `prefix=url;strip`.
impl FromStr for RouteConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s
            .trim()
            .split_once('=')
            .ok_or_else(|| format!("route {s:?} is not prefix=url[;strip]"))?;
        let (upstream, strip) = match rest.split_once(';') {
            Some((url, strip)) => {
                let strip = strip
                    .trim()
                    .parse()
                    .map_err(|_| format!("strip count in {s:?} is not a number"))?;
                (url, strip)
            }
            None => (rest, 0),
        };

        let prefix = prefix.trim();
        if !prefix.starts_with('/') {
            return Err(format!("route prefix {prefix:?} must start with '/'"));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            upstream: upstream.trim().trim_end_matches('/').to_string(),
            strip_prefix: strip,
        })
    }
}

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Paths that skip authentication. Entries ending in `/` match as prefixes,
    /// other entries match exactly.
    #[serde(default = "GatewayConfig::default_public_paths")]
    pub public_paths: Vec<String>,

    /// Requests allowed per key per window.
    #[serde(default = "GatewayConfig::default_rate_limit_requests")]
    pub rate_limit_requests: u64,

    /// Window length in seconds.
    #[serde(default = "GatewayConfig::default_rate_limit_window")]
    pub rate_limit_window_seconds: u64,

    /// Deadline for each counter store call, in milliseconds.
    #[serde(default = "GatewayConfig::default_store_timeout")]
    pub store_timeout_millis: u64,

    /// Behavior when the counter store is unavailable.
    #[serde(default)]
    pub store_failure_policy: FailurePolicy,

    /// Redis URL for the shared counter store. When absent an in-process
    /// store is used.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Upstream routes.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Retries for idempotent requests answered with 502/503.
    #[serde(default = "GatewayConfig::default_upstream_retries")]
    pub upstream_retries: u32,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_public_paths() -> Vec<String> {
        vec![
            "/api/auth/".to_string(),
            "/actuator/".to_string(),
            "/health".to_string(),
        ]
    }

    const fn default_rate_limit_requests() -> u64 {
        100
    }

    const fn default_rate_limit_window() -> u64 {
        60
    }

    const fn default_store_timeout() -> u64 {
        50
    }

    const fn default_upstream_retries() -> u32 {
        3
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(paths) = lookup("PUBLIC_PATHS") {
            config.public_paths = split_list(&paths).map(str::to_string).collect();
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_REQUESTS")? {
            config.rate_limit_requests = v;
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_WINDOW_SECONDS")? {
            config.rate_limit_window_seconds = v;
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_STORE_TIMEOUT_MS")? {
            config.store_timeout_millis = v;
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_FAILURE_POLICY")? {
            config.store_failure_policy = v;
        }
        config.redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        if let Some(routes) = lookup("UPSTREAM_ROUTES") {
            config.routes = split_list(&routes)
                .map(str::parse)
                .collect::<Result<_, String>>()
                .map_err(|reason| ConfigError::Invalid {
                    name: "UPSTREAM_ROUTES".to_string(),
                    reason,
                })?;
        }
        if let Some(v) = parse_var(&lookup, "UPSTREAM_RETRIES")? {
            config.upstream_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_BODY_BYTES")? {
            config.max_body_bytes = v;
        }
        if let Some(v) = parse_var(&lookup, "REQUEST_TIMEOUT_SECONDS")? {
            config.request_timeout_seconds = v;
        }

        if config.rate_limit_window_seconds == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_WINDOW_SECONDS".to_string(),
                reason: "window must be at least one second".to_string(),
            });
        }

        Ok(config)
    }

    /// Get the rate-limit window as a `Duration`.
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }

    /// Get the per-call store deadline as a `Duration`.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_millis)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            public_paths: Self::default_public_paths(),
            rate_limit_requests: Self::default_rate_limit_requests(),
            rate_limit_window_seconds: Self::default_rate_limit_window(),
            store_timeout_millis: Self::default_store_timeout(),
            store_failure_policy: FailurePolicy::default(),
            redis_url: None,
            routes: Vec::new(),
            upstream_retries: Self::default_upstream_retries(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name: name.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
