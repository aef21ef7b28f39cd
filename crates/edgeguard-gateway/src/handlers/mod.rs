//! Endpoints the gateway answers itself.

pub mod health;
