//! Fixed-window rate limiting against the shared counter store.
//!
//! Each key gets `limit` requests per window. The first request of a window
//! creates the counter and sets its expiry; the window ends when the store
//! expires the key. Every response for a metered request carries the
//! `X-RateLimit-*` headers, including rejections.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use chrono::{DateTime, Utc};

use edgeguard_core::{headers, RateLimitKey};
use edgeguard_store::{rate_limit_key, CounterStore, StoreError};

use crate::config::{FailurePolicy, GatewayConfig};
use crate::error::GatewayError;
use crate::pipeline::{Filter, Next, RequestContext};

/// Quota state for one key after counting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether the request fits in the quota.
    pub allowed: bool,
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests left in this window.
    pub remaining: u64,
    /// When the window resets.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Write the quota headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(headers::RATE_LIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(
            headers::RATE_LIMIT_REMAINING,
            HeaderValue::from(self.remaining),
        );
        headers.insert(
            headers::RATE_LIMIT_RESET,
            HeaderValue::from(self.reset_at.timestamp()),
        );
    }
}

/// The rate-limiting filter.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: u64,
    window: Duration,
    store_timeout: Duration,
    policy: FailurePolicy,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` requests per `window`.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
            store_timeout: Duration::from_millis(50),
            policy: FailurePolicy::FailOpen,
        }
    }

    /// Create a limiter from the gateway configuration.
    #[must_use]
    pub fn from_config(store: Arc<dyn CounterStore>, config: &GatewayConfig) -> Self {
        Self::new(store, config.rate_limit_requests, config.rate_limit_window())
            .with_store_timeout(config.store_timeout())
            .with_failure_policy(config.store_failure_policy)
    }

    /// Set the deadline for each store call.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the behavior when the store is unavailable.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Count a request for `key` and report the quota state.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if counting the request fails or exceeds the
    /// store timeout. A failed TTL lookup does not fail the check; the reset
    /// time then assumes a full window.
    pub async fn check(
        &self,
        key: &RateLimitKey,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus, StoreError> {
        let store_key = rate_limit_key(key);

        let count = self.bounded(self.store.increment(&store_key)).await?;
        if count == 1 {
            self.bounded(self.store.expire(&store_key, self.window))
                .await?;
        }

        let ttl = match self.bounded(self.store.ttl(&store_key)).await {
            Ok(Some(ttl)) => ttl,
            Ok(None) => {
                // The writer of count == 1 never set the expiry.
                tracing::debug!(key = %key, count, "Counter has no expiry, repairing window");
                if let Err(err) = self
                    .bounded(self.store.expire_if_unset(&store_key, self.window))
                    .await
                {
                    tracing::warn!(key = %key, error = %err, "Failed to repair counter expiry");
                }
                self.window
            }
            Err(err) => {
                // The request is already counted; only the reset time is unknown.
                tracing::warn!(key = %key, error = %err, "TTL lookup failed, assuming a full window");
                self.window
            }
        };

        Ok(RateLimitStatus {
            allowed: count <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(count),
            reset_at: now + to_chrono(ttl),
        })
    }

    /// Quota reported when the store is unavailable and the policy admits.
    fn unmetered(&self, now: DateTime<Utc>) -> RateLimitStatus {
        RateLimitStatus {
            allowed: true,
            limit: self.limit,
            remaining: self.limit,
            reset_at: now + to_chrono(self.window),
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

#[async_trait]
impl Filter for RateLimiter {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        let key = RateLimitKey::resolve(ctx.identity(), ctx.remote_ip());
        let path = ctx.path().to_string();
        let now = Utc::now();

        let status = match self.check(&key, now).await {
            Ok(status) => status,
            Err(err) => match self.policy {
                FailurePolicy::FailOpen => {
                    tracing::warn!(key = %key, error = %err, "Counter store unavailable, admitting request");
                    self.unmetered(now)
                }
                FailurePolicy::FailClosed => {
                    tracing::error!(key = %key, error = %err, "Counter store unavailable, rejecting request");
                    return GatewayError::UpstreamUnavailable(
                        "Rate limiting is temporarily unavailable. Please try again later."
                            .to_string(),
                    )
                    .into_response_for(&path);
                }
            },
        };

        if !status.allowed {
            tracing::warn!(key = %key, limit = status.limit, path = %path, "Rate limit exceeded");
            let mut response = GatewayError::RateLimitExceeded.into_response_for(&path);
            status.apply(response.headers_mut());
            return response;
        }

        let mut response = next.run(ctx).await;
        status.apply(response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{request, RecordingUpstream};
    use crate::pipeline::Pipeline;
    use axum::http::{Method, StatusCode};
    use edgeguard_core::Identity;
    use edgeguard_store::MemoryCounterStore;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    const WINDOW: Duration = Duration::from_secs(60);

    fn limiter(limit: u64) -> (Arc<MemoryCounterStore>, RateLimiter) {
        let store = Arc::new(MemoryCounterStore::new());
        let limiter = RateLimiter::new(store.clone(), limit, WINDOW);
        (store, limiter)
    }

    fn user(email: &str) -> RateLimitKey {
        RateLimitKey::for_identity(&Identity::new(email, ["USER"]).unwrap())
    }

    /// Store whose calls always fail.
    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn increment(&self, _key: &str) -> edgeguard_store::Result<u64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn expire(&self, _key: &str, _window: Duration) -> edgeguard_store::Result<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn expire_if_unset(
            &self,
            _key: &str,
            _window: Duration,
        ) -> edgeguard_store::Result<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ttl(&self, _key: &str) -> edgeguard_store::Result<Option<Duration>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Store that never answers in time.
    struct SlowStore;

    #[async_trait]
    impl CounterStore for SlowStore {
        async fn increment(&self, _key: &str) -> edgeguard_store::Result<u64> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        }
        async fn expire(&self, _key: &str, _window: Duration) -> edgeguard_store::Result<()> {
            Ok(())
        }
        async fn expire_if_unset(
            &self,
            _key: &str,
            _window: Duration,
        ) -> edgeguard_store::Result<bool> {
            Ok(true)
        }
        async fn ttl(&self, _key: &str) -> edgeguard_store::Result<Option<Duration>> {
            Ok(None)
        }
    }

    /// Store that counts normally but cannot report TTLs.
    #[derive(Default)]
    struct NoTtlStore {
        inner: MemoryCounterStore,
    }

    #[async_trait]
    impl CounterStore for NoTtlStore {
        async fn increment(&self, key: &str) -> edgeguard_store::Result<u64> {
            self.inner.increment(key).await
        }
        async fn expire(&self, key: &str, window: Duration) -> edgeguard_store::Result<()> {
            self.inner.expire(key, window).await
        }
        async fn expire_if_unset(
            &self,
            key: &str,
            window: Duration,
        ) -> edgeguard_store::Result<bool> {
            self.inner.expire_if_unset(key, window).await
        }
        async fn ttl(&self, _key: &str) -> edgeguard_store::Result<Option<Duration>> {
            Err(StoreError::Unavailable("ttl lookup failed".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hundredth_allowed_hundred_and_first_rejected() {
        let (_store, limiter) = limiter(100);
        let key = user("alice@example.com");
        let now = Utc::now();

        for i in 1..100 {
            let status = limiter.check(&key, now).await.unwrap();
            assert!(status.allowed);
            assert_eq!(status.remaining, 100 - i);
        }

        let hundredth = limiter.check(&key, now).await.unwrap();
        assert!(hundredth.allowed);
        assert_eq!(hundredth.remaining, 0);
        assert_eq!(hundredth.limit, 100);

        let over = limiter.check(&key, now).await.unwrap();
        assert!(!over.allowed);
        assert_eq!(over.remaining, 0);
        assert_eq!(over.reset_at, hundredth.reset_at);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_is_window_end() {
        let (_store, limiter) = limiter(10);
        let key = user("alice@example.com");
        let now = Utc::now();

        let first = limiter.check(&key, now).await.unwrap();
        assert_eq!(first.reset_at.timestamp(), (now + chrono::Duration::seconds(60)).timestamp());

        tokio::time::advance(Duration::from_secs(15)).await;
        let later = now + chrono::Duration::seconds(15);
        let second = limiter.check(&key, later).await.unwrap();
        assert_eq!(second.reset_at.timestamp(), first.reset_at.timestamp());
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_restores_quota() {
        let (_store, limiter) = limiter(2);
        let key = user("alice@example.com");

        limiter.check(&key, Utc::now()).await.unwrap();
        limiter.check(&key, Utc::now()).await.unwrap();
        assert!(!limiter.check(&key, Utc::now()).await.unwrap().allowed);

        tokio::time::advance(WINDOW).await;
        let fresh = limiter.check(&key, Utc::now()).await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_counted_independently() {
        let (_store, limiter) = limiter(1);
        let now = Utc::now();

        assert!(limiter.check(&user("a@example.com"), now).await.unwrap().allowed);
        assert!(limiter.check(&user("b@example.com"), now).await.unwrap().allowed);

        let ip_a = RateLimitKey::for_origin(Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        let ip_b = RateLimitKey::for_origin(Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
        assert!(limiter.check(&ip_a, now).await.unwrap().allowed);
        assert!(limiter.check(&ip_b, now).await.unwrap().allowed);

        assert!(!limiter.check(&user("a@example.com"), now).await.unwrap().allowed);
        assert!(!limiter.check(&ip_a, now).await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_without_expiry_is_repaired() {
        let (store, limiter) = limiter(10);
        let key = user("alice@example.com");

        // A previous writer incremented but died before setting the expiry.
        store.increment(&rate_limit_key(&key)).await.unwrap();
        assert_eq!(store.ttl(&rate_limit_key(&key)).await.unwrap(), None);

        let status = limiter.check(&key, Utc::now()).await.unwrap();
        assert_eq!(status.remaining, 8);
        assert_eq!(
            store.ttl(&rate_limit_key(&key)).await.unwrap(),
            Some(WINDOW)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repair_does_not_restart_a_running_window() {
        let (store, limiter) = limiter(10);
        let key = user("alice@example.com");
        let store_key = rate_limit_key(&key);

        store.increment(&store_key).await.unwrap();
        store.expire(&store_key, WINDOW).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert!(!store.expire_if_unset(&store_key, WINDOW).await.unwrap());
        limiter.check(&key, Utc::now()).await.unwrap();
        assert_eq!(
            store.ttl(&store_key).await.unwrap(),
            Some(Duration::from_secs(40))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ttl_lookup_keeps_the_real_count() {
        let limiter = RateLimiter::new(Arc::new(NoTtlStore::default()), 10, WINDOW);
        let key = user("alice@example.com");
        let now = Utc::now();

        limiter.check(&key, now).await.unwrap();
        let status = limiter.check(&key, now).await.unwrap();

        assert!(status.allowed);
        assert_eq!(status.remaining, 8);
        assert_eq!(status.reset_at, now + chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn failed_ttl_lookup_is_not_a_store_outage() {
        let upstream = Arc::new(RecordingUpstream::default());
        let limiter = RateLimiter::new(Arc::new(NoTtlStore::default()), 100, WINDOW)
            .with_failure_policy(FailurePolicy::FailClosed);
        let pipeline = Pipeline::new(upstream.clone()).with_filter(Arc::new(limiter));

        let response = pipeline
            .handle(RequestContext::from_request(request(Method::GET, "/api/orders"), None))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(upstream.calls(), 1);
        assert_eq!(response.headers()[headers::RATE_LIMIT_REMAINING], "99");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_share_one_counter() {
        let (_store, limiter) = limiter(100);
        let limiter = Arc::new(limiter);
        let key = user("alice@example.com");
        let now = Utc::now();

        let checks = (0..150).map(|_| {
            let limiter = Arc::clone(&limiter);
            let key = key.clone();
            async move { limiter.check(&key, now).await.unwrap() }
        });
        let results = futures::future::join_all(checks).await;

        assert_eq!(results.iter().filter(|s| s.allowed).count(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let limiter = RateLimiter::new(Arc::new(SlowStore), 10, WINDOW)
            .with_store_timeout(Duration::from_millis(20));

        let result = limiter.check(&user("alice@example.com"), Utc::now()).await;
        assert_eq!(result, Err(StoreError::Timeout));
    }

    #[tokio::test]
    async fn fail_open_admits_with_full_quota_headers() {
        let upstream = Arc::new(RecordingUpstream::default());
        let limiter = RateLimiter::new(Arc::new(DownStore), 100, WINDOW);
        let pipeline = Pipeline::new(upstream.clone()).with_filter(Arc::new(limiter));

        let response = pipeline
            .handle(RequestContext::from_request(request(Method::GET, "/api/orders"), None))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(upstream.calls(), 1);
        assert_eq!(response.headers()[headers::RATE_LIMIT_LIMIT], "100");
        assert_eq!(response.headers()[headers::RATE_LIMIT_REMAINING], "100");
    }

    #[tokio::test]
    async fn fail_closed_rejects_with_503() {
        let upstream = Arc::new(RecordingUpstream::default());
        let limiter = RateLimiter::new(Arc::new(DownStore), 100, WINDOW)
            .with_failure_policy(FailurePolicy::FailClosed);
        let pipeline = Pipeline::new(upstream.clone()).with_filter(Arc::new(limiter));

        let response = pipeline
            .handle(RequestContext::from_request(request(Method::GET, "/api/orders"), None))
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_carries_headers_and_skips_upstream() {
        let upstream = Arc::new(RecordingUpstream::default());
        let (_store, limiter) = limiter(1);
        let pipeline = Pipeline::new(upstream.clone()).with_filter(Arc::new(limiter));
        let addr: SocketAddr = "203.0.113.9:4000".parse().unwrap();

        let first = pipeline
            .handle(RequestContext::from_request(request(Method::GET, "/x"), Some(addr)))
            .await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[headers::RATE_LIMIT_REMAINING], "0");

        let second = pipeline
            .handle(RequestContext::from_request(request(Method::GET, "/x"), Some(addr)))
            .await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[headers::RATE_LIMIT_LIMIT], "1");
        assert_eq!(second.headers()[headers::RATE_LIMIT_REMAINING], "0");
        assert_eq!(
            second.headers()[headers::RATE_LIMIT_RESET],
            first.headers()[headers::RATE_LIMIT_RESET]
        );
        assert_eq!(upstream.calls(), 1);
    }
}
