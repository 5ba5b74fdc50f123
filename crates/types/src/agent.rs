use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, OrganizationId};

/// Kind of registered entity. MCP servers are verified exactly like agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    #[default]
    Agent,
    McpServer,
}

/// Lifecycle status of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registered, identity not yet verified
    #[default]
    Pending,
    /// Identity verified
    Verified,
    /// Temporarily barred from acting
    Suspended,
    /// Permanently barred from acting
    Revoked,
}

impl AgentStatus {
    /// Whether an agent in this status may have actions verified at all
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Verified)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Suspended => "suspended",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered agent.
///
/// The agent's trust score is deliberately not stored here: the trust
/// crate keeps an append-only history and a current-score cache instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub kind: AgentKind,
    /// Raw Ed25519 public key bytes
    pub public_key: Vec<u8>,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.id, self.status)
    }
}

/// Registration payload handed over by the external registration flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgent {
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub kind: AgentKind,
    pub public_key: Vec<u8>,
    #[serde(default)]
    pub status: AgentStatus,
}
