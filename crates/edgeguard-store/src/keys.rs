//! Key layout in the shared store.

use edgeguard_core::RateLimitKey;

/// Prefix for every rate-limit counter.
pub const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// Store key for a partition's counter: `rate_limit:<key>`.
#[must_use]
pub fn rate_limit_key(key: &RateLimitKey) -> String {
    format!("{RATE_LIMIT_PREFIX}{key}")
}
