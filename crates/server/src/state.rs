//! Shared server state

use std::sync::Arc;
use std::time::{Duration, Instant};

use agentid_core::{AgentRegistry, CapabilityStore, InMemoryAgentRegistry, InMemoryCapabilityStore};
use agentid_trust::{
    AlertStore, InMemoryTrustLedger, RecalculationHandle, RecalculationWorker, SignalStore,
    TrustConfig, TrustScoreCache, TrustScoreCalculator, TrustScoreSnapshot,
};
use agentid_types::{Agent, AgentId, NewAgent, RecalculationReason};
use agentid_verify::{
    AuditRecorder, DriftDetector, DriftStats, InMemoryAuditStore, PlatformFactorProvider,
    RateWindowTracker, VerificationEngine, VerifierConfig,
};
use tracing::info;

use crate::auth::{Authenticator, Caller};
use crate::error::ApiError;
use crate::seed::{SeedError, SeedFile};

/// Everything a request handler can reach
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn AgentRegistry>,
    pub capabilities: Arc<dyn CapabilityStore>,
    pub engine: VerificationEngine,
    pub recorder: AuditRecorder,
    pub calculator: Arc<TrustScoreCalculator>,
    pub recalculation: RecalculationHandle,
    pub drift: Arc<DriftDetector>,
    pub alerts: Arc<AlertStore>,
    pub signals: Arc<SignalStore>,
    pub authenticator: Arc<dyn Authenticator>,
    started_at: Instant,
}

impl AppState {
    /// Wire the engine, trust calculator and drift detector over in-memory
    /// stores.
    ///
    /// The returned worker must be started for queued and scheduled
    /// recalculations to run.
    pub fn in_memory(
        trust_config: TrustConfig,
        verifier_config: VerifierConfig,
        authenticator: Arc<dyn Authenticator>,
        recalc_interval: Option<Duration>,
    ) -> agentid_trust::Result<(Self, RecalculationWorker)> {
        let registry = Arc::new(InMemoryAgentRegistry::new());
        let capabilities = Arc::new(InMemoryCapabilityStore::new(registry.clone()));
        let audit = Arc::new(InMemoryAuditStore::new());
        let alerts = Arc::new(AlertStore::new());
        let signals = Arc::new(SignalStore::new());
        let drift_stats = Arc::new(DriftStats::new());
        let scores = Arc::new(TrustScoreCache::new());
        let impacts = trust_config.alert_impacts;

        let provider = PlatformFactorProvider::new(
            registry.clone(),
            audit.clone(),
            alerts.clone(),
            signals.clone(),
            drift_stats.clone(),
        );
        let calculator = Arc::new(TrustScoreCalculator::new(
            trust_config,
            Arc::new(provider),
            Arc::new(InMemoryTrustLedger::new()),
            scores.clone(),
        )?);
        let (worker, recalculation) = RecalculationWorker::new(calculator.clone(), recalc_interval);

        let engine = VerificationEngine::new(
            registry.clone(),
            capabilities.clone(),
            Arc::new(RateWindowTracker::new()),
            scores,
            audit.clone(),
            verifier_config,
        );
        let recorder = AuditRecorder::new(audit).with_recalculation(recalculation.clone());
        let drift = DriftDetector::new(
            registry.clone(),
            capabilities.clone(),
            alerts.clone(),
            drift_stats,
            impacts,
        )
        .with_recalculation(recalculation.clone());

        let state = Self {
            registry,
            capabilities,
            engine,
            recorder,
            calculator,
            recalculation,
            drift: Arc::new(drift),
            alerts,
            signals,
            authenticator,
            started_at: Instant::now(),
        };
        Ok((state, worker))
    }

    /// Register an agent and compute its first trust score.
    ///
    /// Registration is driven by the surrounding platform, not the HTTP
    /// API.
    pub async fn register_agent(
        &self,
        agent: NewAgent,
    ) -> Result<(Agent, TrustScoreSnapshot), ApiError> {
        self.register(None, agent).await
    }

    /// Register every agent of a seed file and grant its capabilities.
    /// Stops at the first agent that cannot be registered.
    pub async fn seed_agents(&self, seed: &SeedFile) -> Result<Vec<Agent>, SeedError> {
        let mut seeded = Vec::with_capacity(seed.agents.len());
        for entry in &seed.agents {
            let failed = |source: ApiError| SeedError::Registration {
                name: entry.name.clone(),
                source,
            };

            let (agent, _) = self.register(entry.id, entry.new_agent()?).await.map_err(failed)?;
            for spec in &entry.capabilities {
                self.capabilities
                    .grant_capability(&agent.id, spec.clone())
                    .await
                    .map_err(|e| failed(e.into()))?;
            }
            info!(
                agent_id = %agent.id,
                name = %agent.name,
                grants = entry.capabilities.len(),
                "agent seeded"
            );
            seeded.push(agent);
        }
        Ok(seeded)
    }

    async fn register(
        &self,
        agent_id: Option<AgentId>,
        agent: NewAgent,
    ) -> Result<(Agent, TrustScoreSnapshot), ApiError> {
        let agent = match agent_id {
            Some(agent_id) => self.registry.register_with_id(agent_id, agent).await?,
            None => self.registry.register(agent).await?,
        };
        let snapshot = self
            .calculator
            .compute_score(&agent.id, RecalculationReason::Registration)
            .await?;
        info!(agent_id = %agent.id, score = snapshot.score, "agent registered");
        Ok((agent, snapshot))
    }

    /// Look up an agent owned by the caller's organization. Agents of other
    /// organizations are reported as not found.
    pub async fn owned_agent(&self, caller: &Caller, agent_id: &AgentId) -> Result<Agent, ApiError> {
        match self.registry.get(agent_id).await? {
            Some(agent) if agent.organization_id == caller.organization_id => Ok(agent),
            _ => Err(ApiError::NotFound(format!("agent {agent_id} not found"))),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
