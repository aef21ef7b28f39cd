//! Header names used on the wire.
//!
//! All names are lowercase so they can be used with `HeaderName::from_static`.

/// Verified caller email injected into forwarded requests.
pub const USER_EMAIL: &str = "x-user-email";

/// Comma-joined verified roles injected into forwarded requests.
pub const USER_ROLES: &str = "x-user-roles";

/// Request ceiling for the current window.
pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";

/// Requests left in the current window.
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Epoch second at which the current window resets.
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// The bearer scheme prefix, matched case-sensitively.
pub const BEARER_PREFIX: &str = "Bearer ";
