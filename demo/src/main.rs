use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use agentid_core::CapabilityStore;
use agentid_crypto::KeyPair;
use agentid_server::{ApiKeyAuthenticator, AppState};
use agentid_trust::TrustConfig;
use agentid_types::{
    ActionRequest, ActionStatus, AgentKind, AgentStatus, CapabilityScope, CapabilitySpec,
    CapabilityType, FileSystemScope, NewAgent, OrganizationId, RateLimits, RecalculationReason,
};
use agentid_verify::{CapabilityReport, ReportedCapability, VerifierConfig, VerifyError};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting AgentID verification demo...");

    let (state, worker) = AppState::in_memory(
        TrustConfig::default(),
        VerifierConfig::default(),
        Arc::new(ApiKeyAuthenticator::new()),
        None,
    )?;
    let (shutdown, worker_task) = worker.start();

    // 1. Register an agent; its first trust score is computed right away
    let keys = KeyPair::generate();
    let (agent, snapshot) = state
        .register_agent(NewAgent {
            organization_id: OrganizationId::new(),
            name: "demo-agent".into(),
            kind: AgentKind::Agent,
            public_key: keys.public_key().as_bytes().to_vec(),
            status: AgentStatus::Verified,
        })
        .await?;
    info!("Registered {}", agent);
    info!("Initial trust score: {} ({})", snapshot.score, snapshot.level);

    // 2. Grant read access to /tmp, three times a minute, keys excluded
    let grant = state
        .capabilities
        .grant_capability(
            &agent.id,
            CapabilitySpec::new(CapabilityType::FileRead)
                .with_scope(CapabilityScope::FileSystem(FileSystemScope {
                    allowed_paths: vec!["/tmp/*".into()],
                    forbidden_paths: vec!["/tmp/*.key".into()],
                    max_file_size: None,
                }))
                .with_limits(RateLimits::per_minute(3)),
        )
        .await?;
    info!("Granted {} as {}", grant.capability_type(), grant.id);

    // 3. Verify a few actions
    let mut first_audit_id = None;
    for resource in ["/tmp/report.csv", "/tmp/id.key", "/etc/passwd"] {
        let decision = state
            .engine
            .verify_action(&ActionRequest::new(agent.id, "file_read", resource))
            .await?;
        info!(
            "file_read {} -> allowed: {}, reason: {}",
            resource, decision.allowed, decision.reason
        );
        if decision.allowed {
            first_audit_id.get_or_insert(decision.audit_id);
        }
    }

    // 4. Exhaust the rate limit
    for attempt in 1..=3 {
        let decision = state
            .engine
            .verify_action(&ActionRequest::new(agent.id, "file_read", "/tmp/data.json"))
            .await?;
        info!(
            "attempt {} -> allowed: {}, reason: {}",
            attempt, decision.allowed, decision.reason
        );
    }

    // 5. Report what happened to the first allowed action, twice
    if let Some(audit_id) = first_audit_id {
        let record = state
            .recorder
            .log_action_result(
                &audit_id,
                Some(&agent.id),
                ActionStatus::Success,
                serde_json::json!({"bytes_read": 2048}),
            )
            .await?;
        info!("Logged outcome for {}: {:?}", audit_id, record.state());

        match state
            .recorder
            .log_action_result(&audit_id, Some(&agent.id), ActionStatus::Failed, serde_json::Value::Null)
            .await
        {
            Err(VerifyError::AlreadyFinalized(id)) => info!("Second outcome for {} rejected", id),
            other => warn!("Unexpected second outcome: {:?}", other.map(|r| r.state())),
        }
    }

    // 6. A signed capability report revealing an ungranted capability
    let mut report = CapabilityReport {
        agent_id: agent.id,
        reported_at: chrono::Utc::now(),
        capabilities: vec![
            ReportedCapability {
                capability_type: "file_read".into(),
                resources: vec!["/tmp/report.csv".into()],
                usage_count: 2,
            },
            ReportedCapability {
                capability_type: "credential_access".into(),
                resources: vec!["prod/db-password".into()],
                usage_count: 1,
            },
        ],
        signature: None,
    };
    report.signature = Some(keys.sign(&report.signing_payload()).to_base64());

    let assessment = state.drift.submit(report).await?;
    info!(
        "Drift assessment: risk {:?}, impact {}",
        assessment.risk_level, assessment.trust_score_impact
    );
    for alert in &assessment.alerts {
        info!("  [{}] {}", alert.severity, alert.message);
    }

    // 7. Recalculate and show the factors
    let snapshot = state
        .calculator
        .compute_score(&agent.id, RecalculationReason::Manual)
        .await?;
    info!("Trust score now: {} ({})", snapshot.score, snapshot.level);
    for factor in &snapshot.factors {
        info!(
            "  {:<20} value {:>6.2} x weight {:.2} = {:.2}",
            factor.factor.as_str(),
            factor.value,
            factor.weight,
            factor.contribution
        );
    }

    // 8. The audit trail is intact
    state.recorder.verify_chain().await?;
    let records = state.recorder.records_for_agent(&agent.id).await?;
    info!("Audit chain verified over {} records", records.len());

    let _ = shutdown.send(true);
    worker_task.await?;

    info!("Demo completed successfully!");
    Ok(())
}
