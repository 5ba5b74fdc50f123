use agentid_crypto::KeyPair;
use agentid_server::{SeedError, SeedFile};
use agentid_types::AgentId;
use axum::http::StatusCode;
use serde_json::json;

use super::test_app;

fn seed_for(org: impl std::fmt::Display, id: AgentId) -> SeedFile {
    SeedFile::from_toml_str(&format!(
        r#"
        [[agents]]
        id = "{id}"
        organization_id = "{org}"
        name = "seeded-reader"
        status = "verified"
        public_key = "{key}"

        [[agents.capabilities]]
        type = "file_read"
        scope = {{ kind = "file_system", allowed_paths = ["/tmp/*"] }}
        "#,
        key = KeyPair::generate().public_key().to_base64()
    ))
    .unwrap()
}

#[tokio::test]
async fn test_seeded_agent_is_served() {
    let app = test_app();
    let id = AgentId::new();
    let seeded = app.state.seed_agents(&seed_for(app.acme, id)).await.unwrap();
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded[0].id, id);

    let (status, body) = app
        .post(
            &format!("/agents/{id}/verify-action"),
            json!({"action_type": "file_read", "resource": "/tmp/report.txt"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    let (status, body) = app.get(&format!("/agents/{id}/trust-score")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["trustScore"].as_f64().is_some());
}

#[tokio::test]
async fn test_seeding_twice_fails_on_the_taken_id() {
    let app = test_app();
    let seed = seed_for(app.acme, AgentId::new());
    app.state.seed_agents(&seed).await.unwrap();

    match app.state.seed_agents(&seed).await {
        Err(SeedError::Registration { name, .. }) => assert_eq!(name, "seeded-reader"),
        other => panic!("expected a registration error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_seeded_grant_is_rejected() {
    let app = test_app();
    let seed = SeedFile::from_toml_str(&format!(
        r#"
        [[agents]]
        organization_id = "{}"
        name = "bad-grant"
        public_key = "{}"

        [[agents.capabilities]]
        type = "network_access"
        scope = {{ kind = "file_system", allowed_paths = ["/tmp/*"] }}
        "#,
        app.acme,
        KeyPair::generate().public_key().to_base64()
    ))
    .unwrap();

    assert!(matches!(
        app.state.seed_agents(&seed).await,
        Err(SeedError::Registration { .. })
    ));
}
