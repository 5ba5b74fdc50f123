#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

//! HTTP surface of the AgentID verification engine
//!
//! Exposes verification, action-result logging, trust scores, capability
//! grants and drift reports behind API-key authentication.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod seed;
pub mod state;

pub use api::create_router;
pub use auth::{ApiKeyAuthenticator, Authenticator, Caller};
pub use config::{ConfigError, LogFormat, ServerConfig};
pub use error::ApiError;
pub use seed::{SeedAgent, SeedError, SeedFile};
pub use state::AppState;
