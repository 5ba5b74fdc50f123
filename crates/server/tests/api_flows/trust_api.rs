use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use super::test_app;

#[tokio::test]
async fn test_registration_publishes_a_score() {
    let app = test_app();
    let agent_id = app.agent().await;

    let (status, body) = app.get(&format!("/agents/{agent_id}/trust-score")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trustScore"], 79.5);
    assert_eq!(body["level"], "high");
    assert!(body["lastCalculated"].is_string());

    let factors = body["factors"].as_array().unwrap();
    assert_eq!(factors.len(), 8);
    let weights: f64 = factors.iter().map(|f| f["weight"].as_f64().unwrap()).sum();
    assert!((weights - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_synchronous_recalculation_reflects_signals() {
    let app = test_app();
    let agent_id = app.agent().await;
    app.state.signals.set_uptime(agent_id, 50.0).unwrap();

    let (status, body) = app
        .post(
            &format!("/agents/{agent_id}/trust-score/recalculate"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // Uptime weight 0.10 loses 50 points
    assert_eq!(body["trustScore"], 74.5);

    let snapshot = app.state.calculator.cache().current(&agent_id).unwrap();
    assert_eq!(snapshot.reason, "manual recalculation");
}

#[tokio::test]
async fn test_queued_recalculation_runs_on_the_worker() {
    let app = test_app();
    let agent_id = app.agent().await;
    app.state.signals.set_compliance(agent_id, 0.0).unwrap();

    let (status, body) = app
        .post(
            &format!("/agents/{agent_id}/trust-score/recalculate?mode=queued"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["queued"], true);

    let mut score = None;
    for _ in 0..100 {
        let current = app.state.calculator.cache().score(&agent_id);
        if current != Some(79.5) {
            score = current;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Compliance weight 0.10 loses 100 points
    assert_eq!(score, Some(69.5));
}

#[tokio::test]
async fn test_unknown_agent_has_no_score() {
    let app = test_app();
    let (status, _) = app
        .get(&format!("/agents/{}/trust-score", agentid_types::AgentId::new()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
