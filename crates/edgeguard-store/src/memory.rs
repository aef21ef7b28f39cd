//! In-process counter store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::Result;
use crate::CounterStore;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Expired counters are swept at most this often.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Counters {
    entries: HashMap<String, Counter>,
    last_sweep: Option<Instant>,
}

impl Counters {
    /// Drop expired counters if the last sweep is older than `SWEEP_INTERVAL`.
    fn sweep(&mut self, now: Instant) {
        if self
            .last_sweep
            .is_some_and(|at| now.saturating_duration_since(at) < SWEEP_INTERVAL)
        {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, c| !c.is_expired(now));
        self.last_sweep = Some(now);

        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, live = self.entries.len(), "Swept expired counters");
        }
    }

    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Counter> {
        self.entries.get_mut(key).filter(|c| !c.is_expired(now))
    }
}

/// A counter store that lives inside one process.
///
/// Counts are not shared between instances, so limits are only enforced per
/// process. Time is read from `tokio::time`, which lets tests pause and
/// advance the clock. Expired counters are removed during increments, at most
/// once per minute.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<Counters>,
}

impl MemoryCounterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counters.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.counters
            .lock()
            .entries
            .values()
            .filter(|c| !c.is_expired(now))
            .count()
    }

    /// Whether the store holds no live counters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<u64> {
        let now = Instant::now();
        let mut counters = self.counters.lock();
        counters.sweep(now);

        let counter = counters.entries.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: None,
        });
        if counter.is_expired(now) {
            *counter = Counter {
                count: 0,
                expires_at: None,
            };
        }
        counter.count += 1;
        Ok(counter.count)
    }

    async fn expire(&self, key: &str, window: Duration) -> Result<()> {
        let now = Instant::now();
        if let Some(counter) = self.counters.lock().live(key, now) {
            counter.expires_at = Some(now + window);
        }
        Ok(())
    }

    async fn expire_if_unset(&self, key: &str, window: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.counters.lock().live(key, now) {
            Some(counter) if counter.expires_at.is_none() => {
                counter.expires_at = Some(now + window);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        Ok(self
            .counters
            .lock()
            .live(key, now)
            .and_then(|c| c.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn increment_starts_at_one() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment("a").await.unwrap(), 1);
        assert_eq!(store.increment("a").await.unwrap(), 2);
        assert_eq!(store.increment("b").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_without_expiry_has_no_ttl() {
        let store = MemoryCounterStore::new();
        store.increment("a").await.unwrap();
        assert_eq!(store.ttl("a").await.unwrap(), None);
        assert_eq!(store.ttl("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_resets_after_window() {
        let store = MemoryCounterStore::new();
        store.increment("a").await.unwrap();
        store.expire("a", WINDOW).await.unwrap();
        store.increment("a").await.unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(store.ttl("a").await.unwrap(), Some(Duration::from_secs(40)));

        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(store.ttl("a").await.unwrap(), None);
        assert!(store.is_empty());
        assert_eq!(store.increment("a").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_on_missing_key_is_a_no_op() {
        let store = MemoryCounterStore::new();
        store.expire("ghost", WINDOW).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expire_if_unset_keeps_existing_window() {
        let store = MemoryCounterStore::new();
        store.increment("a").await.unwrap();

        assert!(store.expire_if_unset("a", WINDOW).await.unwrap());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!store.expire_if_unset("a", WINDOW).await.unwrap());
        assert_eq!(store.ttl("a").await.unwrap(), Some(Duration::from_secs(50)));

        assert!(!store.expire_if_unset("ghost", WINDOW).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_counters_are_swept() {
        let store = MemoryCounterStore::new();
        for i in 0..10_000 {
            let key = format!("rate_limit:ip:10.0.{}.{}", i / 256, i % 256);
            store.increment(&key).await.unwrap();
            store.expire(&key, WINDOW).await.unwrap();
        }
        assert_eq!(store.counters.lock().entries.len(), 10_000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store.increment("rate_limit:alice@example.com").await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.counters.lock().entries.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryCounterStore::new());

        let tasks = (0..50).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.increment("shared").await.unwrap() })
        });
        let mut counts: Vec<u64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        counts.sort_unstable();

        assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
        assert_eq!(store.len(), 1);
    }
}
