//! Agent lookup and status.
//!
//! Registration itself (key issuance, organization membership) happens
//! elsewhere; this registry only keeps what verification needs and rejects
//! keys that are not valid Ed25519 public keys.

use std::collections::HashMap;

use agentid_crypto::PublicKey;
use agentid_types::{Agent, AgentId, AgentStatus, NewAgent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::{CoreError, Result};

/// Lookup and status surface of registered agents
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Register an agent; fails if the public key is not a valid Ed25519 key
    async fn register(&self, agent: NewAgent) -> Result<Agent>;

    /// Register under a caller-chosen id, as configuration seeding does.
    /// Fails if the id is already taken.
    async fn register_with_id(&self, agent_id: AgentId, agent: NewAgent) -> Result<Agent>;

    async fn get(&self, agent_id: &AgentId) -> Result<Option<Agent>>;

    /// Admin action: move an agent to a new lifecycle status
    async fn set_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<Agent>;

    async fn list(&self) -> Result<Vec<Agent>>;
}

/// In-memory [`AgentRegistry`]
#[derive(Debug, Default)]
pub struct InMemoryAgentRegistry {
    agents: RwLock<HashMap<AgentId, Agent>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with an explicit registration time
    pub async fn register_at(&self, agent: NewAgent, now: DateTime<Utc>) -> Result<Agent> {
        self.insert(AgentId::new(), agent, now).await
    }

    async fn insert(&self, agent_id: AgentId, agent: NewAgent, now: DateTime<Utc>) -> Result<Agent> {
        if agent.name.trim().is_empty() {
            return Err(CoreError::InvalidAgent("name must not be empty".into()));
        }
        PublicKey::from_bytes(&agent.public_key)?;

        let mut agents = self.agents.write().await;
        if agents.contains_key(&agent_id) {
            return Err(CoreError::InvalidAgent(format!(
                "agent {agent_id} is already registered"
            )));
        }

        let agent = Agent {
            id: agent_id,
            organization_id: agent.organization_id,
            name: agent.name,
            kind: agent.kind,
            public_key: agent.public_key,
            status: agent.status,
            created_at: now,
            updated_at: now,
        };

        agents.insert(agent.id, agent.clone());
        info!(agent_id = %agent.id, kind = ?agent.kind, status = %agent.status, "agent registered");
        Ok(agent)
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    async fn register(&self, agent: NewAgent) -> Result<Agent> {
        self.register_at(agent, Utc::now()).await
    }

    async fn register_with_id(&self, agent_id: AgentId, agent: NewAgent) -> Result<Agent> {
        self.insert(agent_id, agent, Utc::now()).await
    }

    async fn get(&self, agent_id: &AgentId) -> Result<Option<Agent>> {
        Ok(self.agents.read().await.get(agent_id).cloned())
    }

    async fn set_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<Agent> {
        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(agent_id)
            .ok_or(CoreError::AgentNotFound(*agent_id))?;

        if agent.status != status {
            info!(agent_id = %agent_id, from = %agent.status, to = %status, "agent status changed");
            agent.status = status;
            agent.updated_at = Utc::now();
        }
        Ok(agent.clone())
    }

    async fn list(&self) -> Result<Vec<Agent>> {
        let mut agents: Vec<Agent> = self.agents.read().await.values().cloned().collect();
        agents.sort_by_key(|agent| agent.created_at);
        Ok(agents)
    }
}
