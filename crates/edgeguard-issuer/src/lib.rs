//! Registration and login service for edgeguard.
//!
//! Issues the HS256 access and refresh tokens the gateway verifies. Passwords
//! are stored as argon2 hashes; accounts live in a [`CredentialStore`].
//!
//! ```text
//! POST /auth/register ─┐
//!                      ├─▶ AuthService ─▶ CredentialStore
//! POST /auth/login ────┘        │
//!                               ▼
//!                          TokenCodec ─▶ { accessToken, refreshToken }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use config::IssuerConfig;
pub use error::{IssuerError, Result};
pub use routes::create_router;
pub use service::{AuthService, LoginRequest, RegisterRequest};
pub use state::IssuerState;
pub use store::{CredentialStore, InMemoryCredentialStore, NewUser, User};
