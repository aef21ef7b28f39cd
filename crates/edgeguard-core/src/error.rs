//! Common error types for edgeguard.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building core values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The identity subject is empty or collides with the origin key space.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// A role name cannot be carried in the comma-joined roles header.
    #[error("invalid role: {0:?}")]
    InvalidRole(String),
}
