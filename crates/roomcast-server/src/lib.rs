//! # roomcast-server
//!
//! The deployable Roomcast relay: configuration, JWT authentication, the
//! SQLite store, HTTP routes and metrics around the hub and client tasks.

pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod metrics;

pub use auth::{AuthError, Authenticator, Identity, JwtAuthenticator};
pub use config::Config;
pub use db::SqliteStore;
pub use handlers::AppState;
