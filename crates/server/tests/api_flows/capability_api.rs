use agentid_crypto::KeyPair;
use agentid_verify::{CapabilityReport, ReportedCapability};
use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::json;

use super::{test_app, ACME_KEY};

#[tokio::test]
async fn test_grant_list_and_revoke() {
    let app = test_app();
    let agent_id = app.agent().await;
    let uri = format!("/agents/{agent_id}/capabilities");

    let (status, grant) = app
        .post(
            &uri,
            json!({
                "type": "network_access",
                "scope": {"kind": "network", "allowed_domains": ["api.example.com"]},
                "limits": {"max_per_minute": 10}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let grant_id = grant["id"].as_str().unwrap().to_string();

    let (status, grants) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grants.as_array().unwrap().len(), 1);

    let (status, revoked) = app
        .send(
            Method::DELETE,
            &format!("{uri}/{grant_id}"),
            Some(ACME_KEY),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(revoked["revoked_at"].is_string());

    // Revoked grants no longer allow anything
    let (_, decision) = app
        .post(
            &format!("/agents/{agent_id}/verify-action"),
            json!({"action_type": "network_access", "resource": "https://api.example.com/v1"}),
        )
        .await;
    assert_eq!(decision["allowed"], false);
}

#[tokio::test]
async fn test_mismatched_scope_is_rejected() {
    let app = test_app();
    let agent_id = app.agent().await;

    let (status, body) = app
        .post(
            &format!("/agents/{agent_id}/capabilities"),
            json!({
                "type": "file_read",
                "scope": {"kind": "database", "allowed_tables": ["users"]}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_failed");
}

#[tokio::test]
async fn test_revoking_an_unknown_grant() {
    let app = test_app();
    let agent_id = app.agent().await;
    let (status, _) = app
        .send(
            Method::DELETE,
            &format!(
                "/agents/{agent_id}/capabilities/{}",
                agentid_types::GrantId::new()
            ),
            Some(ACME_KEY),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_report_with_ungranted_capability() {
    let app = test_app();
    let agent_id = app.agent().await;

    let (status, body) = app
        .post(
            &format!("/agents/{agent_id}/capabilities/report"),
            json!({
                "capabilities": [
                    {"type": "credential_access", "resources": ["prod/db-password"], "usage_count": 1}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["riskLevel"], "critical");
    assert_eq!(body["trustScoreImpact"], -20.0);
    assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(app.state.alerts.open_impact(&agent_id).await, -20.0);
}

#[tokio::test]
async fn test_signed_reports() {
    let app = test_app();
    let keys = KeyPair::generate();
    let agent_id = app.agent_with(keys.clone()).await;
    let uri = format!("/agents/{agent_id}/capabilities/report");

    let mut report = CapabilityReport {
        agent_id,
        reported_at: Utc::now(),
        capabilities: vec![ReportedCapability {
            capability_type: "file_read".into(),
            resources: vec![],
            usage_count: 0,
        }],
        signature: None,
    };
    report.signature = Some(keys.sign(&report.signing_payload()).to_base64());

    let body = json!({
        "reportedAt": report.reported_at,
        "capabilities": report.capabilities,
        "signature": report.signature,
    });
    let (status, _) = app.post(&uri, body.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let mut forged = body;
    forged["signature"] = json!(KeyPair::generate()
        .sign(&report.signing_payload())
        .to_base64());
    let (status, body) = app.post(&uri, forged).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}
