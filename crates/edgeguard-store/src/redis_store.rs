//! Redis-backed counter store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{Result, StoreError};
use crate::CounterStore;

/// Counter store backed by a shared Redis instance.
///
/// The connection manager reconnects on its own; each call works on a cheap
/// clone of it.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl RedisCounterStore {
    /// Connect to Redis at `url` (for example `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the URL is invalid or the first
    /// connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!("Connected to counter store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await?;
        Ok(count)
    }

    async fn expire(&self, key: &str, window: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let seconds = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        let _: bool = conn.expire(key, seconds).await?;
        Ok(())
    }

    async fn expire_if_unset(&self, key: &str, window: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let seconds = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        // EXPIRE ... NX needs Redis 7.0 or newer.
        let set: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(set == 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn.clone();
        // -2: missing key, -1: no expiry
        let seconds: i64 = conn.ttl(key).await?;
        Ok(u64::try_from(seconds).ok().map(Duration::from_secs))
    }
}
