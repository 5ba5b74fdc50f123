//! Decision flows: default deny, deny precedence, trust minimums and
//! schedules.

use agentid_core::{AgentRegistry, CapabilityStore};
use agentid_types::{
    ActionRequest, ActionStatus, AgentStatus, CapabilityScope, CapabilitySpec, CapabilityType,
    FileSystemScope, HourRange, RecalculationReason, RecordState, Schedule,
};
use agentid_verify::DenialReason;
use chrono::{TimeZone, Utc};

use super::{platform, tmp_reader};

#[tokio::test]
async fn test_tmp_reader_end_to_end() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform.grant(&agent_id, tmp_reader(5)).await;

    let allowed = platform
        .engine
        .verify_action(&ActionRequest::new(agent_id, "file_read", "/tmp/a.txt"))
        .await
        .unwrap();
    assert!(allowed.allowed);
    assert_eq!(allowed.reason, "allowed");

    let denied = platform
        .engine
        .verify_action(&ActionRequest::new(agent_id, "file_read", "/etc/passwd"))
        .await
        .unwrap();
    assert!(!denied.allowed);
    assert_eq!(
        denied.reason,
        "no matching capability: path '/etc/passwd' is not within allowed paths"
    );
    assert!(denied.audit_id > allowed.audit_id);

    let logged = platform
        .recorder
        .log_action_result(
            &allowed.audit_id,
            Some(&agent_id),
            ActionStatus::Success,
            serde_json::json!({"bytes_read": 42}),
        )
        .await
        .unwrap();
    assert_eq!(logged.state(), RecordState::Logged);

    let records = platform.recorder.records_for_agent(&agent_id).await.unwrap();
    let states: Vec<RecordState> = records.iter().map(|r| r.state()).collect();
    assert_eq!(states, vec![RecordState::Logged, RecordState::Denied]);
    assert_eq!(records[1].reason, denied.reason);
}

#[tokio::test]
async fn test_default_deny_without_grants() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;

    for (action_type, resource) in [
        ("file_read", "/tmp/a.txt"),
        ("network_access", "https://example.com"),
        ("code_execution", "python"),
        ("made_up", "anything"),
    ] {
        let decision = platform
            .engine
            .verify_action(&ActionRequest::new(agent_id, action_type, resource))
            .await
            .unwrap();
        assert!(!decision.allowed, "{action_type} on {resource} was allowed");
        assert_eq!(decision.reason, "no capabilities granted");
    }
}

#[tokio::test]
async fn test_deny_list_wins_across_grants() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform
        .grant(
            &agent_id,
            CapabilitySpec::new(CapabilityType::FileRead).with_scope(CapabilityScope::FileSystem(
                FileSystemScope {
                    allowed_paths: vec!["/srv/*".into()],
                    forbidden_paths: vec!["/srv/private.key".into()],
                    max_file_size: None,
                },
            )),
        )
        .await;
    // a second, broader grant does not override the forbid
    platform
        .grant(&agent_id, CapabilitySpec::new(CapabilityType::FileRead))
        .await;

    let decision = platform
        .engine
        .verify_action(&ActionRequest::new(agent_id, "file_read", "/srv/private.key"))
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert!(matches!(
        decision.denial,
        Some(DenialReason::CapabilityDenied { .. })
    ));
    assert!(decision.reason.starts_with("capability denied: "));

    let other = platform
        .engine
        .verify_action(&ActionRequest::new(agent_id, "file_read", "/srv/public.txt"))
        .await
        .unwrap();
    assert!(other.allowed);
}

#[tokio::test]
async fn test_forbidden_path_cannot_be_reached_by_equivalent_spelling() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform
        .grant(
            &agent_id,
            CapabilitySpec::new(CapabilityType::FileRead).with_scope(CapabilityScope::FileSystem(
                FileSystemScope {
                    forbidden_paths: vec!["/etc/*".into()],
                    ..FileSystemScope::default()
                },
            )),
        )
        .await;

    for path in ["/etc/passwd", "/tmp/../etc/passwd", "//etc/passwd", "/./etc/passwd"] {
        let decision = platform
            .engine
            .verify_action(&ActionRequest::new(agent_id, "file_read", path))
            .await
            .unwrap();
        assert!(!decision.allowed, "{path} was allowed");
        assert!(
            matches!(decision.denial, Some(DenialReason::CapabilityDenied { .. })),
            "{path} was not denied by the deny-list"
        );
    }

    let fine = platform
        .engine
        .verify_action(&ActionRequest::new(agent_id, "file_read", "/tmp/./notes.txt"))
        .await
        .unwrap();
    assert!(fine.allowed);
    assert_eq!(platform.engine.scopes().len(), 1);
}

#[tokio::test]
async fn test_revoked_and_inactive() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    let grant = platform.grant(&agent_id, tmp_reader(5)).await;
    let request = ActionRequest::new(agent_id, "file_read", "/tmp/a.txt");

    platform
        .capabilities
        .revoke_capability(&agent_id, &grant.id)
        .await
        .unwrap();
    let decision = platform.engine.verify_action(&request).await.unwrap();
    assert_eq!(decision.reason, "no capabilities granted");

    platform.grant(&agent_id, tmp_reader(5)).await;
    assert!(platform.engine.verify_action(&request).await.unwrap().allowed);

    platform
        .registry
        .set_status(&agent_id, AgentStatus::Revoked)
        .await
        .unwrap();
    let decision = platform.engine.verify_action(&request).await.unwrap();
    assert_eq!(decision.reason, "agent not active");
}

#[tokio::test]
async fn test_min_trust_score() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform
        .grant(&agent_id, tmp_reader(10).with_min_trust_score(90.0))
        .await;
    platform
        .grant(
            &agent_id,
            CapabilitySpec::new(CapabilityType::FileWrite).with_min_trust_score(70.0),
        )
        .await;

    let read = ActionRequest::new(agent_id, "file_read", "/tmp/a.txt");
    let write = ActionRequest::new(agent_id, "file_write", "/tmp/b.txt");

    // no score yet
    let decision = platform.engine.verify_action(&write).await.unwrap();
    assert!(!decision.allowed);
    assert!(decision.reason.contains("trust score unknown"));

    let snapshot = platform
        .calculator
        .compute_score(&agent_id, RecalculationReason::Registration)
        .await
        .unwrap();
    assert_eq!(snapshot.score, 79.5);

    let decision = platform.engine.verify_action(&read).await.unwrap();
    assert_eq!(
        decision.reason,
        "capability denied: trust score 79.50 is below required minimum 90.00"
    );
    let decision = platform.engine.verify_action(&write).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.trust_score, Some(79.5));
}

#[tokio::test]
async fn test_schedule_window() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform
        .grant(
            &agent_id,
            tmp_reader(10).with_schedule(Schedule {
                allowed_hours: Some(HourRange { start: 9, end: 17 }),
                ..Schedule::default()
            }),
        )
        .await;
    let request = ActionRequest::new(agent_id, "file_read", "/tmp/a.txt");

    let evening = Utc.with_ymd_and_hms(2024, 5, 6, 20, 0, 0).unwrap();
    let decision = platform.engine.verify_action_at(&request, evening).await.unwrap();
    assert_eq!(decision.reason, "outside allowed window");
    assert_eq!(decision.denial, Some(DenialReason::OutsideAllowedWindow));

    let morning = Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap();
    assert!(platform
        .engine
        .verify_action_at(&request, morning)
        .await
        .unwrap()
        .allowed);
}
