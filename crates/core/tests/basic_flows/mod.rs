//! Basic flow tests for the core crate.
//! These tests exercise the registry and capability store together.

mod capability_flows;
mod registry_flows;

use std::sync::Arc;

use agentid_core::{AgentRegistry, InMemoryAgentRegistry, InMemoryCapabilityStore};
use agentid_crypto::KeyPair;
use agentid_types::{Agent, AgentKind, AgentStatus, NewAgent, OrganizationId};

pub(crate) struct Fixture {
    pub registry: Arc<InMemoryAgentRegistry>,
    pub store: InMemoryCapabilityStore,
}

pub(crate) fn fixture() -> Fixture {
    let registry = Arc::new(InMemoryAgentRegistry::new());
    let store = InMemoryCapabilityStore::new(registry.clone());
    Fixture { registry, store }
}

pub(crate) async fn register(registry: &InMemoryAgentRegistry, status: AgentStatus) -> Agent {
    registry
        .register(NewAgent {
            organization_id: OrganizationId::new(),
            name: "flow-agent".into(),
            kind: AgentKind::Agent,
            public_key: KeyPair::generate().public_key().as_bytes().to_vec(),
            status,
        })
        .await
        .unwrap()
}
