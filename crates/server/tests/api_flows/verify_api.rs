use agentid_types::{CapabilityScope, CapabilitySpec, CapabilityType, FileSystemScope, RateLimits};
use axum::http::{Method, StatusCode};
use serde_json::json;

use super::{test_app, GLOBEX_KEY};

fn tmp_reader() -> CapabilitySpec {
    CapabilitySpec::new(CapabilityType::FileRead)
        .with_scope(CapabilityScope::FileSystem(FileSystemScope {
            allowed_paths: vec!["/tmp/*".into()],
            ..FileSystemScope::default()
        }))
        .with_limits(RateLimits::per_minute(3))
}

#[tokio::test]
async fn test_health_is_public() {
    let app = test_app();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_agent_routes_require_a_valid_key() {
    let app = test_app();
    let agent_id = app.agent().await;
    let uri = format!("/agents/{agent_id}/trust-score");

    let (status, body) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = app.send(Method::GET, &uri, Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_other_organizations_see_not_found() {
    let app = test_app();
    let agent_id = app.agent().await;
    app.grant(&agent_id, tmp_reader()).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/agents/{agent_id}/verify-action"),
            Some(GLOBEX_KEY),
            Some(json!({"action_type": "file_read", "resource": "/tmp/a.txt"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["message"], format!("agent {agent_id} not found"));

    // the engine rejected the caller before recording a decision
    let records = app.state.recorder.records_for_agent(&agent_id).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_verify_then_log_action() {
    let app = test_app();
    let agent_id = app.agent().await;
    app.grant(&agent_id, tmp_reader()).await;

    let (status, decision) = app
        .post(
            &format!("/agents/{agent_id}/verify-action"),
            json!({"actionType": "file_read", "resource": "/tmp/report.csv"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["allowed"], true);
    assert_eq!(decision["reason"], "allowed");
    let audit_id = decision["audit_id"].as_str().unwrap().to_string();

    let log_uri = format!("/agents/{agent_id}/log-action/{audit_id}");
    let (status, logged) = app
        .post(&log_uri, json!({"status": "success", "result": {"bytes": 512}}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logged["audit_id"], audit_id.as_str());
    assert_eq!(logged["status"], "success");
    assert!(logged["completed_at"].is_string());

    let (status, body) = app.post(&log_uri, json!({"status": "failed"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "already_finalized");
}

#[tokio::test]
async fn test_denials_are_decisions() {
    let app = test_app();
    let agent_id = app.agent().await;
    app.grant(&agent_id, tmp_reader()).await;

    let (status, decision) = app
        .post(
            &format!("/agents/{agent_id}/verify-action"),
            json!({"action_type": "file_read", "resource": "/etc/passwd"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["allowed"], false);
    assert!(decision["reason"]
        .as_str()
        .unwrap()
        .starts_with("no matching capability"));

    // Denied records cannot take an outcome
    let audit_id = decision["audit_id"].as_str().unwrap();
    let (status, _) = app
        .post(
            &format!("/agents/{agent_id}/log-action/{audit_id}"),
            json!({"status": "success"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_rate_limit_over_http() {
    let app = test_app();
    let agent_id = app.agent().await;
    app.grant(&agent_id, tmp_reader()).await;
    let uri = format!("/agents/{agent_id}/verify-action");
    let body = json!({"action_type": "file_read", "resource": "/tmp/a.txt"});

    for _ in 0..3 {
        let (_, decision) = app.post(&uri, body.clone()).await;
        assert_eq!(decision["allowed"], true);
    }
    let (_, decision) = app.post(&uri, body).await;
    assert_eq!(decision["allowed"], false);
    assert_eq!(decision["denial"]["code"], "rate_limit_exceeded");
}

#[tokio::test]
async fn test_invalid_bodies_are_rejected() {
    let app = test_app();
    let agent_id = app.agent().await;
    let uri = format!("/agents/{agent_id}/verify-action");

    let (status, body) = app
        .post(&uri, json!({"action_type": "", "resource": "/tmp/a"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_failed");

    let (status, body) = app.post(&uri, json!({"resource": "/tmp/a"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_unknown_record_is_not_found() {
    let app = test_app();
    let agent_id = app.agent().await;
    let (status, _) = app
        .post(
            &format!("/agents/{agent_id}/log-action/0190c6a0-0000-7000-8000-000000000000"),
            json!({"status": "success"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unconfirmed_lists_allowed_records_without_outcome() {
    let app = test_app();
    let agent_id = app.agent().await;
    app.grant(&agent_id, tmp_reader()).await;
    let verify_uri = format!("/agents/{agent_id}/verify-action");

    let (_, first) = app
        .post(&verify_uri, json!({"action_type": "file_read", "resource": "/tmp/a"}))
        .await;
    let (_, second) = app
        .post(&verify_uri, json!({"action_type": "file_read", "resource": "/tmp/b"}))
        .await;
    app.post(
        &format!(
            "/agents/{agent_id}/log-action/{}",
            first["audit_id"].as_str().unwrap()
        ),
        json!({"status": "success"}),
    )
    .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let uri = format!("/agents/{agent_id}/verifications/unconfirmed");
    let (status, body) = app.get(&format!("{uri}?older_than_secs=0")).await;
    assert_eq!(status, StatusCode::OK);
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["audit_id"], second["audit_id"]);

    // Default threshold is minutes, nothing qualifies yet
    let (_, body) = app.get(&uri).await;
    assert!(body["records"].as_array().unwrap().is_empty());
}
