use std::sync::Arc;

use agentid_types::{AgentId, CapabilityGrant, CapabilitySpec, GrantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use super::{validate_spec, CapabilityStore};
use crate::{AgentRegistry, CoreError, Result};

/// In-memory [`CapabilityStore`].
///
/// Grants are kept per agent; the map entry lock serializes writers of the
/// same agent while different agents never contend.
pub struct InMemoryCapabilityStore {
    registry: Arc<dyn AgentRegistry>,
    grants: DashMap<AgentId, Vec<CapabilityGrant>>,
}

impl InMemoryCapabilityStore {
    pub fn new(registry: Arc<dyn AgentRegistry>) -> Self {
        Self {
            registry,
            grants: DashMap::new(),
        }
    }

    /// Grant with an explicit grant time
    pub async fn grant_capability_at(
        &self,
        agent_id: &AgentId,
        spec: CapabilitySpec,
        now: DateTime<Utc>,
    ) -> Result<CapabilityGrant> {
        validate_spec(&spec)?;
        if self.registry.get(agent_id).await?.is_none() {
            return Err(CoreError::AgentNotFound(*agent_id));
        }

        let grant = CapabilityGrant {
            id: GrantId::new(),
            agent_id: *agent_id,
            spec,
            granted_at: now,
            revoked_at: None,
        };
        self.grants.entry(*agent_id).or_default().push(grant.clone());

        info!(
            agent_id = %agent_id,
            grant_id = %grant.id,
            capability = %grant.capability_type(),
            "capability granted"
        );
        Ok(grant)
    }

    fn filtered(
        &self,
        agent_id: &AgentId,
        keep: impl Fn(&CapabilityGrant) -> bool,
    ) -> Vec<CapabilityGrant> {
        self.grants
            .get(agent_id)
            .map(|grants| grants.iter().filter(|g| keep(g)).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CapabilityStore for InMemoryCapabilityStore {
    async fn active_capabilities(
        &self,
        agent_id: &AgentId,
        at: DateTime<Utc>,
    ) -> Result<Vec<CapabilityGrant>> {
        Ok(self.filtered(agent_id, |grant| grant.is_active_at(at)))
    }

    async fn unrevoked_capabilities(&self, agent_id: &AgentId) -> Result<Vec<CapabilityGrant>> {
        Ok(self.filtered(agent_id, |grant| !grant.is_revoked()))
    }

    async fn list_capabilities(&self, agent_id: &AgentId) -> Result<Vec<CapabilityGrant>> {
        Ok(self.filtered(agent_id, |_| true))
    }

    async fn grant_capability(
        &self,
        agent_id: &AgentId,
        spec: CapabilitySpec,
    ) -> Result<CapabilityGrant> {
        self.grant_capability_at(agent_id, spec, Utc::now()).await
    }

    async fn revoke_capability(
        &self,
        agent_id: &AgentId,
        grant_id: &GrantId,
    ) -> Result<CapabilityGrant> {
        let mut grants = self
            .grants
            .get_mut(agent_id)
            .ok_or(CoreError::GrantNotFound(*grant_id))?;
        let grant = grants
            .iter_mut()
            .find(|grant| grant.id == *grant_id)
            .ok_or(CoreError::GrantNotFound(*grant_id))?;

        if grant.revoked_at.is_none() {
            grant.revoked_at = Some(Utc::now());
            info!(agent_id = %agent_id, grant_id = %grant_id, "capability revoked");
        } else {
            debug!(agent_id = %agent_id, grant_id = %grant_id, "capability already revoked");
        }
        Ok(grant.clone())
    }
}
