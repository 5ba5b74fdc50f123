//! Action result and audit trail flows.

use agentid_types::{ActionRequest, ActionStatus, AgentStatus, RecordState};
use agentid_verify::{AuditStore, VerifyError};
use chrono::{Duration, Utc};

use super::{platform, tmp_reader};

#[tokio::test]
async fn test_double_log_is_already_finalized() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform.grant(&agent_id, tmp_reader(5)).await;

    let decision = platform
        .engine
        .verify_action(&ActionRequest::new(agent_id, "file_read", "/tmp/a.txt"))
        .await
        .unwrap();

    platform
        .recorder
        .log_action_result(
            &decision.audit_id,
            None,
            ActionStatus::Success,
            serde_json::json!({"rows": 1}),
        )
        .await
        .unwrap();
    let second = platform
        .recorder
        .log_action_result(
            &decision.audit_id,
            None,
            ActionStatus::Failed,
            serde_json::json!({"error": "late"}),
        )
        .await;
    assert!(matches!(second, Err(VerifyError::AlreadyFinalized(id)) if id == decision.audit_id));

    let record = platform.audit.get(&decision.audit_id).await.unwrap().unwrap();
    let outcome = record.outcome.unwrap();
    assert_eq!(outcome.status, ActionStatus::Success);
    assert_eq!(outcome.result, serde_json::json!({"rows": 1}));
}

#[tokio::test]
async fn test_denied_decision_cannot_be_logged() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;

    let decision = platform
        .engine
        .verify_action(&ActionRequest::new(agent_id, "file_read", "/tmp/a.txt"))
        .await
        .unwrap();
    assert!(!decision.allowed);

    let result = platform
        .recorder
        .log_action_result(&decision.audit_id, None, ActionStatus::Success, serde_json::Value::Null)
        .await;
    assert!(matches!(result, Err(VerifyError::AlreadyFinalized(_))));

    let record = platform.audit.get(&decision.audit_id).await.unwrap().unwrap();
    assert_eq!(record.state(), RecordState::Denied);
}

#[tokio::test]
async fn test_unconfirmed_allows_and_chain() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform.grant(&agent_id, tmp_reader(10)).await;
    let earlier = Utc::now() - Duration::minutes(10);

    let request = ActionRequest::new(agent_id, "file_read", "/tmp/a.txt");
    let old = platform.engine.verify_action_at(&request, earlier).await.unwrap();
    platform.engine.verify_action(&request).await.unwrap();

    let unconfirmed = platform
        .recorder
        .unconfirmed(Duration::minutes(5), Utc::now())
        .await
        .unwrap();
    assert_eq!(unconfirmed.len(), 1);
    assert_eq!(unconfirmed[0].audit_id, old.audit_id);

    assert!(platform.recorder.verify_chain().await.is_ok());
}
