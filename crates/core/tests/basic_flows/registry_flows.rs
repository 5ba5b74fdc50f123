//! Registry flows: registration, lookup and status changes.

use agentid_core::{AgentRegistry, CoreError};
use agentid_types::{AgentKind, AgentStatus, NewAgent, OrganizationId};

use super::{fixture, register};

#[tokio::test]
async fn test_mcp_servers_register_like_agents() {
    let fx = fixture();
    let key = agentid_crypto::KeyPair::generate();
    let server = fx
        .registry
        .register(NewAgent {
            organization_id: OrganizationId::new(),
            name: "filesystem-mcp".into(),
            kind: AgentKind::McpServer,
            public_key: key.public_key().as_bytes().to_vec(),
            status: AgentStatus::Pending,
        })
        .await
        .unwrap();

    assert_eq!(server.kind, AgentKind::McpServer);
    assert!(server.is_active());
}

#[tokio::test]
async fn test_status_lifecycle() {
    let fx = fixture();
    let agent = register(&fx.registry, AgentStatus::Pending).await;

    for (status, active) in [
        (AgentStatus::Verified, true),
        (AgentStatus::Suspended, false),
        (AgentStatus::Verified, true),
        (AgentStatus::Revoked, false),
    ] {
        let updated = fx.registry.set_status(&agent.id, status).await.unwrap();
        assert_eq!(updated.status, status);
        assert_eq!(updated.is_active(), active);
    }

    let listed = fx.registry.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, AgentStatus::Revoked);
}

#[tokio::test]
async fn test_empty_name_rejected() {
    let fx = fixture();
    let result = fx
        .registry
        .register(NewAgent {
            organization_id: OrganizationId::new(),
            name: "  ".into(),
            kind: AgentKind::Agent,
            public_key: agentid_crypto::KeyPair::generate().public_key().as_bytes().to_vec(),
            status: AgentStatus::Verified,
        })
        .await;
    assert!(matches!(result, Err(CoreError::InvalidAgent(_))));
}
