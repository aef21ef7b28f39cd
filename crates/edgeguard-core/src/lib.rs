//! Core types shared across edgeguard.
//!
//! This crate provides the foundational types used by both the gateway and the
//! token issuer:
//!
//! - **Identity**: the verified caller extracted from an access token
//! - **Rate-limit keys**: the partition key for per-caller quotas
//! - **Problem details**: the RFC 7807 error body every rejection uses
//! - **Header names**: the forwarding and quota headers on the wire
//!
//! # Example
//!
//! ```
//! use edgeguard_core::{Identity, RateLimitKey};
//!
//! let identity = Identity::new("alice@example.com", ["USER", "ADMIN"]).unwrap();
//! assert_eq!(identity.roles_header(), "USER,ADMIN");
//!
//! let key = RateLimitKey::for_identity(&identity);
//! assert_eq!(key.as_str(), "alice@example.com");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod headers;
pub mod identity;
pub mod problem;

pub use error::{CoreError, Result};
pub use identity::{Identity, RateLimitKey, ORIGIN_KEY_PREFIX};
pub use problem::{ProblemDetail, FALLBACK_PROBLEM_BODY};
