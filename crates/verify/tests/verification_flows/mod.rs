//! End-to-end verification flows.
//! These tests wire the engine to the in-memory stores, the trust
//! calculator and the drift detector the way the server does.

mod audit_flows;
mod decision_flows;
mod drift_flows;
mod rate_flows;

use std::sync::Arc;

use agentid_core::{AgentRegistry, CapabilityStore, InMemoryAgentRegistry, InMemoryCapabilityStore};
use agentid_crypto::KeyPair;
use agentid_trust::{
    AlertStore, InMemoryTrustLedger, SignalStore, TrustConfig, TrustScoreCache,
    TrustScoreCalculator,
};
use agentid_types::{
    AgentId, AgentKind, AgentStatus, CapabilityGrant, CapabilityScope, CapabilitySpec,
    CapabilityType, FileSystemScope, NewAgent, OrganizationId, RateLimits,
};
use agentid_verify::{
    AuditRecorder, DriftDetector, DriftStats, InMemoryAuditStore, PlatformFactorProvider,
    RateWindowTracker, VerificationEngine, VerifierConfig,
};

pub(crate) struct Platform {
    pub registry: Arc<InMemoryAgentRegistry>,
    pub capabilities: Arc<InMemoryCapabilityStore>,
    pub audit: Arc<InMemoryAuditStore>,
    pub alerts: Arc<AlertStore>,
    pub calculator: Arc<TrustScoreCalculator>,
    pub engine: VerificationEngine,
    pub recorder: AuditRecorder,
    pub drift: DriftDetector,
}

pub(crate) fn platform() -> Platform {
    let registry = Arc::new(InMemoryAgentRegistry::new());
    let capabilities = Arc::new(InMemoryCapabilityStore::new(registry.clone()));
    let audit = Arc::new(InMemoryAuditStore::new());
    let alerts = Arc::new(AlertStore::new());
    let drift_stats = Arc::new(DriftStats::new());
    let scores = Arc::new(TrustScoreCache::new());
    let config = TrustConfig::default();

    let provider = PlatformFactorProvider::new(
        registry.clone(),
        audit.clone(),
        alerts.clone(),
        Arc::new(SignalStore::new()),
        drift_stats.clone(),
    );
    let calculator = Arc::new(
        TrustScoreCalculator::new(
            config.clone(),
            Arc::new(provider),
            Arc::new(InMemoryTrustLedger::new()),
            scores.clone(),
        )
        .unwrap(),
    );

    let engine = VerificationEngine::new(
        registry.clone(),
        capabilities.clone(),
        Arc::new(RateWindowTracker::new()),
        scores,
        audit.clone(),
        VerifierConfig::default(),
    );
    let recorder = AuditRecorder::new(audit.clone());
    let drift = DriftDetector::new(
        registry.clone(),
        capabilities.clone(),
        alerts.clone(),
        drift_stats,
        config.alert_impacts,
    );

    Platform {
        registry,
        capabilities,
        audit,
        alerts,
        calculator,
        engine,
        recorder,
        drift,
    }
}

impl Platform {
    pub async fn agent(&self, status: AgentStatus) -> AgentId {
        self.registry
            .register(NewAgent {
                organization_id: OrganizationId::new(),
                name: "flow-agent".into(),
                kind: AgentKind::Agent,
                public_key: KeyPair::generate().public_key().as_bytes().to_vec(),
                status,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn grant(&self, agent_id: &AgentId, spec: CapabilitySpec) -> CapabilityGrant {
        self.capabilities
            .grant_capability(agent_id, spec)
            .await
            .unwrap()
    }
}

/// `file_read` on `/tmp/*` with the given per-minute limit
pub(crate) fn tmp_reader(per_minute: u32) -> CapabilitySpec {
    CapabilitySpec::new(CapabilityType::FileRead)
        .with_scope(CapabilityScope::FileSystem(FileSystemScope {
            allowed_paths: vec!["/tmp/*".into()],
            ..FileSystemScope::default()
        }))
        .with_limits(RateLimits::per_minute(per_minute))
}
