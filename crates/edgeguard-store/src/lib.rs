//! Shared request counters for edgeguard rate limiting.
//!
//! Every gateway instance counts requests in the same store, so a caller's
//! quota is enforced across the whole fleet rather than per instance.
//!
//! # Implementations
//!
//! - [`RedisCounterStore`]: the production store, one Redis shared by all
//!   instances
//! - [`MemoryCounterStore`]: a single-process store for development and tests
//!
//! # Counter lifecycle
//!
//! ```text
//! increment(k) == 1 ──▶ expire(k, window) ──▶ ... ──▶ key expires ──▶ fresh window
//! ```
//!
//! The window starts with the first request and is never extended by later
//! ones. If a counter is ever found without an expiry, the caller is expected
//! to repair it with [`CounterStore::expire_if_unset`] so the key cannot live
//! forever.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use edgeguard_store::{CounterStore, MemoryCounterStore};
//!
//! # async fn demo() -> edgeguard_store::Result<()> {
//! let store = MemoryCounterStore::new();
//! assert_eq!(store.increment("rate_limit:alice").await?, 1);
//! store.expire("rate_limit:alice", Duration::from_secs(60)).await?;
//! assert!(store.ttl("rate_limit:alice").await?.is_some());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

pub use error::{Result, StoreError};
pub use keys::rate_limit_key;
pub use memory::MemoryCounterStore;
pub use redis_store::RedisCounterStore;

/// Atomic counters with expiry, shared between gateway instances.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment a counter and return the new value.
    ///
    /// A missing (or expired) counter starts at zero, so the first call
    /// returns 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn increment(&self, key: &str) -> Result<u64>;

    /// Set the counter to expire after `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn expire(&self, key: &str, window: Duration) -> Result<()>;

    /// Set the counter to expire after `window` only if it has no expiry yet.
    ///
    /// Returns `true` if the expiry was set. An existing expiry is never
    /// replaced, so a window started by another writer is not restarted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn expire_if_unset(&self, key: &str, window: Duration) -> Result<bool>;

    /// Remaining lifetime of a counter.
    ///
    /// Returns `None` if the counter does not exist or has no expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}
