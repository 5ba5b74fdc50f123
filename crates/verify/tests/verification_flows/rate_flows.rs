//! Rate limit flows.

use agentid_types::{ActionRequest, AgentStatus};
use agentid_verify::DenialReason;
use chrono::{Duration, TimeZone, Utc};

use super::{platform, tmp_reader};

#[tokio::test]
async fn test_three_per_minute() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform.grant(&agent_id, tmp_reader(3)).await;
    let request = ActionRequest::new(agent_id, "file_read", "/tmp/a.txt");
    let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap();

    for second in 0..3 {
        let decision = platform
            .engine
            .verify_action_at(&request, t0 + Duration::seconds(second * 10))
            .await
            .unwrap();
        assert!(decision.allowed);
    }

    let fourth = platform
        .engine
        .verify_action_at(&request, t0 + Duration::seconds(30))
        .await
        .unwrap();
    assert!(!fourth.allowed);
    assert_eq!(fourth.reason, "rate limit exceeded");
    assert_eq!(
        fourth.denial,
        Some(DenialReason::RateLimitExceeded {
            retry_after_secs: 30
        })
    );

    // the first action has left the window
    let later = platform
        .engine
        .verify_action_at(&request, t0 + Duration::seconds(61))
        .await
        .unwrap();
    assert!(later.allowed);
}

#[tokio::test]
async fn test_denied_requests_consume_no_quota() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform.grant(&agent_id, tmp_reader(1)).await;
    let now = Utc::now();

    let outside = ActionRequest::new(agent_id, "file_read", "/etc/hosts");
    for _ in 0..5 {
        assert!(!platform
            .engine
            .verify_action_at(&outside, now)
            .await
            .unwrap()
            .allowed);
    }
    let inside = ActionRequest::new(agent_id, "file_read", "/tmp/a.txt");
    assert!(platform
        .engine
        .verify_action_at(&inside, now)
        .await
        .unwrap()
        .allowed);
}

#[tokio::test]
async fn test_limits_are_per_agent() {
    let platform = platform();
    let first = platform.agent(AgentStatus::Verified).await;
    let second = platform.agent(AgentStatus::Verified).await;
    platform.grant(&first, tmp_reader(1)).await;
    platform.grant(&second, tmp_reader(1)).await;
    let now = Utc::now();

    for agent_id in [first, second] {
        let request = ActionRequest::new(agent_id, "file_read", "/tmp/a.txt");
        assert!(platform
            .engine
            .verify_action_at(&request, now)
            .await
            .unwrap()
            .allowed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_admit_exactly_the_limit() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform.grant(&agent_id, tmp_reader(5)).await;
    let now = Utc::now();

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let engine = platform.engine.clone();
            let request = ActionRequest::new(agent_id, "file_read", format!("/tmp/{i}.txt"));
            tokio::spawn(async move { engine.verify_action_at(&request, now).await })
        })
        .collect();

    let decisions = futures::future::join_all(tasks).await;
    let allowed = decisions
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .filter(|decision| decision.allowed)
        .count();
    assert_eq!(allowed, 5);
}
