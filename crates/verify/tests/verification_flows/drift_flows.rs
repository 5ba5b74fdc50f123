//! Drift reports feeding back into trust scores.

use std::time::Duration;

use agentid_trust::{RecalculationWorker, TrustLevel};
use agentid_types::{AgentStatus, RecalculationReason, RiskLevel};
use agentid_verify::{CapabilityReport, DriftDetector, ReportedCapability};
use chrono::Utc;

use super::{platform, tmp_reader};

#[tokio::test]
async fn test_ungranted_usage_lowers_trust() {
    let platform = platform();
    let agent_id = platform.agent(AgentStatus::Verified).await;
    platform.grant(&agent_id, tmp_reader(5)).await;

    let before = platform
        .calculator
        .compute_score(&agent_id, RecalculationReason::Registration)
        .await
        .unwrap();
    assert_eq!(before.level, TrustLevel::High);

    let (worker, handle) = RecalculationWorker::new(platform.calculator.clone(), None);
    let (shutdown, task) = worker.start();
    let detector: DriftDetector = platform.drift.with_recalculation(handle);

    let assessment = detector
        .submit(CapabilityReport {
            agent_id,
            reported_at: Utc::now(),
            capabilities: vec![ReportedCapability {
                capability_type: "credential_access".into(),
                resources: vec!["prod/db-password".into()],
                usage_count: 1,
            }],
            signature: None,
        })
        .await
        .unwrap();
    assert_eq!(assessment.risk_level, RiskLevel::Critical);
    assert_eq!(assessment.trust_score_impact, -20.0);

    // the queued recalculation lands in the cache
    let cache = platform.calculator.cache().clone();
    let mut after = None;
    for _ in 0..100 {
        match cache.current(&agent_id) {
            Some(snapshot) if snapshot.calculated_at > before.calculated_at => {
                after = Some(snapshot);
                break;
            }
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    let after = after.expect("recalculation did not run");
    assert_eq!(after.reason, "post-capability-report");
    // security alerts 80 and drift 0: 79.5 - 3.0 - 17.0
    assert_eq!(after.score, 59.5);
    assert_eq!(after.level, TrustLevel::Medium);
    assert_eq!(platform.alerts.open_for_agent(&agent_id).await.len(), 1);

    shutdown.send(true).unwrap();
    task.await.unwrap();
}
