use std::sync::Arc;

use agentid_types::{AgentId, RecalculationReason, TrustScoreHistoryEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::score::composite_score;
use crate::{
    FactorInputs, Result, TrustConfig, TrustLedger, TrustScoreCache, TrustScoreSnapshot,
};

/// Source of the normalized factor inputs for an agent.
///
/// Implementations gather evidence from wherever it lives (agent status,
/// action outcomes, alerts, drift reports, monitoring signals). Values
/// outside [0, 100] are clamped by the calculator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FactorProvider: Send + Sync {
    async fn factor_inputs(&self, agent_id: &AgentId, at: DateTime<Utc>) -> Result<FactorInputs>;
}

/// Computes composite trust scores and records every computation
pub struct TrustScoreCalculator {
    config: TrustConfig,
    provider: Arc<dyn FactorProvider>,
    ledger: Arc<dyn TrustLedger>,
    cache: Arc<TrustScoreCache>,
}

impl TrustScoreCalculator {
    /// Create a calculator; fails if the configuration is invalid
    pub fn new(
        config: TrustConfig,
        provider: Arc<dyn FactorProvider>,
        ledger: Arc<dyn TrustLedger>,
        cache: Arc<TrustScoreCache>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            ledger,
            cache,
        })
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// The cache this calculator publishes to
    pub fn cache(&self) -> &Arc<TrustScoreCache> {
        &self.cache
    }

    pub fn ledger(&self) -> &Arc<dyn TrustLedger> {
        &self.ledger
    }

    pub async fn compute_score(
        &self,
        agent_id: &AgentId,
        reason: RecalculationReason,
    ) -> Result<TrustScoreSnapshot> {
        self.compute_score_at(agent_id, reason, Utc::now()).await
    }

    /// Compute the score as of `now`, append factors and history, then
    /// publish the result to the cache.
    ///
    /// The cache is only updated after the ledger write succeeds, so the
    /// current score always has a matching history entry.
    #[instrument(skip_all, fields(agent_id = %agent_id, reason = %reason))]
    pub async fn compute_score_at(
        &self,
        agent_id: &AgentId,
        reason: RecalculationReason,
        now: DateTime<Utc>,
    ) -> Result<TrustScoreSnapshot> {
        let inputs = self.provider.factor_inputs(agent_id, now).await?;
        debug!(?inputs, "factor inputs collected");

        let factors = inputs.to_factors(*agent_id, &self.config.weights, now);
        let score = composite_score(&factors);
        let level = self.config.level_for(score);

        let entry = TrustScoreHistoryEntry {
            agent_id: *agent_id,
            score,
            reason: reason.to_string(),
            calculated_at: now,
        };
        self.ledger.append(factors.clone(), entry).await?;

        let snapshot = TrustScoreSnapshot {
            agent_id: *agent_id,
            score,
            level,
            factors,
            calculated_at: now,
            reason: reason.to_string(),
        };
        self.cache.publish(snapshot.clone());

        info!(score, %level, "trust score recalculated");
        Ok(snapshot)
    }
}
