//! Capability flows: grant, match, revoke.

use agentid_core::{evaluate_scope, CapabilityStore, CoreError, ScopeMatch};
use agentid_types::{
    ActionContext, AgentStatus, CapabilityScope, CapabilitySpec, CapabilityType,
    FileSystemScope, NetworkScope, RateLimits,
};
use chrono::Utc;

use super::{fixture, register};

fn tmp_reader() -> CapabilitySpec {
    CapabilitySpec::new(CapabilityType::FileRead)
        .with_scope(CapabilityScope::FileSystem(FileSystemScope {
            allowed_paths: vec!["/tmp/*".into()],
            ..FileSystemScope::default()
        }))
        .with_limits(RateLimits::per_minute(5))
}

#[tokio::test]
async fn test_granted_scope_matches_resources() {
    let fx = fixture();
    let agent = register(&fx.registry, AgentStatus::Verified).await;
    fx.store.grant_capability(&agent.id, tmp_reader()).await.unwrap();

    let grants = fx.store.active_capabilities(&agent.id, Utc::now()).await.unwrap();
    assert_eq!(grants.len(), 1);

    let context = ActionContext::default();
    let grant = &grants[0];
    assert_eq!(
        evaluate_scope(&grant.spec, "/tmp/a.txt", &context, None),
        ScopeMatch::Allowed
    );
    match evaluate_scope(&grant.spec, "/etc/passwd", &context, None) {
        ScopeMatch::NotAllowed(reason) => assert!(reason.contains("/etc/passwd")),
        other => panic!("unexpected match result: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_spec_is_not_stored() {
    let fx = fixture();
    let agent = register(&fx.registry, AgentStatus::Verified).await;

    let mismatched = CapabilitySpec::new(CapabilityType::FileRead).with_scope(
        CapabilityScope::Network(NetworkScope::default()),
    );
    let result = fx.store.grant_capability(&agent.id, mismatched).await;
    assert!(matches!(result, Err(CoreError::InvalidCapability(_))));
    assert!(fx.store.list_capabilities(&agent.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_revocation_history_is_kept() {
    let fx = fixture();
    let agent = register(&fx.registry, AgentStatus::Verified).await;
    let first = fx.store.grant_capability(&agent.id, tmp_reader()).await.unwrap();
    let second = fx
        .store
        .grant_capability(&agent.id, CapabilitySpec::new(CapabilityType::NetworkAccess))
        .await
        .unwrap();

    fx.store.revoke_capability(&agent.id, &first.id).await.unwrap();
    fx.store.revoke_capability(&agent.id, &first.id).await.unwrap();

    let active = fx.store.active_capabilities(&agent.id, Utc::now()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);

    let all = fx.store.list_capabilities(&agent.id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|g| g.id == first.id && g.is_revoked()));
}

#[tokio::test]
async fn test_grants_are_isolated_per_agent() {
    let fx = fixture();
    let alice = register(&fx.registry, AgentStatus::Verified).await;
    let bob = register(&fx.registry, AgentStatus::Verified).await;
    let grant = fx.store.grant_capability(&alice.id, tmp_reader()).await.unwrap();

    assert!(fx.store.unrevoked_capabilities(&bob.id).await.unwrap().is_empty());
    let result = fx.store.revoke_capability(&bob.id, &grant.id).await;
    assert!(matches!(result, Err(CoreError::GrantNotFound(_))));
}
