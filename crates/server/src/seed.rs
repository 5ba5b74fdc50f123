//! Agents and grants registered at startup.
//!
//! The HTTP API never registers agents. A deployment without an external
//! registration flow lists its agents in a seed file instead, pointed to by
//! `AGENTID_AGENTS`.

use std::path::Path;

use agentid_crypto::PublicKey;
use agentid_types::{AgentId, AgentKind, AgentStatus, CapabilitySpec, NewAgent, OrganizationId};
use serde::Deserialize;
use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub agents: Vec<SeedAgent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAgent {
    /// Fixed id so clients can be configured ahead of time; a fresh one is
    /// assigned when absent
    #[serde(default)]
    pub id: Option<AgentId>,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub kind: AgentKind,
    #[serde(default)]
    pub status: AgentStatus,
    /// Base64 Ed25519 public key
    pub public_key: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilitySpec>,
}

impl SeedAgent {
    pub fn new_agent(&self) -> Result<NewAgent, SeedError> {
        let key = PublicKey::from_base64(&self.public_key).map_err(|e| SeedError::InvalidKey {
            name: self.name.clone(),
            detail: e.to_string(),
        })?;
        Ok(NewAgent {
            organization_id: self.organization_id,
            name: self.name.clone(),
            kind: self.kind,
            public_key: key.as_bytes().to_vec(),
            status: self.status,
        })
    }
}

impl SeedFile {
    pub fn from_toml_str(source: &str) -> Result<Self, SeedError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(source)?)
    }

    /// `.json` files are read as JSON, anything else as TOML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_toml_str(&source),
        }
    }
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid seed TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid seed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid public key for agent '{name}': {detail}")]
    InvalidKey { name: String, detail: String },

    #[error("failed to seed agent '{name}': {source}")]
    Registration {
        name: String,
        #[source]
        source: ApiError,
    },
}
