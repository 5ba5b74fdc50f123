//! Agent registry and capability store for the AgentID verification engine.
//!
//! This crate owns the two data sets the verification path reads on every
//! request: who an agent is (and whether it may act at all), and which
//! scoped capabilities it has been granted.

use agentid_types::{AgentId, GrantId};
use thiserror::Error;

pub mod agent;
pub mod capability;

pub use agent::{AgentRegistry, InMemoryAgentRegistry};
pub use capability::{
    evaluate_scope, validate_spec, CapabilityStore, InMemoryCapabilityStore, ScopeCache,
    ScopeMatch, ScopeMatcher,
};

/// Errors that can occur in the registry and capability store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid agent data: {0}")]
    InvalidAgent(String),

    #[error("Invalid capability: {0}")]
    InvalidCapability(String),

    #[error("Capability grant not found: {0}")]
    GrantNotFound(GrantId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<agentid_crypto::CryptoError> for CoreError {
    fn from(err: agentid_crypto::CryptoError) -> Self {
        CoreError::InvalidPublicKey(err.to_string())
    }
}

/// Result type for registry and capability operations
pub type Result<T> = std::result::Result<T, CoreError>;
