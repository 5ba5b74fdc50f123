use std::collections::HashMap;

use agentid_types::{AgentId, TrustScoreFactor, TrustScoreHistoryEntry};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::{Result, TrustScoreSnapshot};

/// Append-only storage for factor rows and score history
#[async_trait]
pub trait TrustLedger: Send + Sync {
    /// Append one recalculation: its eight factor rows and the history entry
    async fn append(
        &self,
        factors: Vec<TrustScoreFactor>,
        entry: TrustScoreHistoryEntry,
    ) -> Result<()>;

    /// Most recent history entries for an agent, newest first
    async fn history(&self, agent_id: &AgentId, limit: usize)
        -> Result<Vec<TrustScoreHistoryEntry>>;

    /// Every factor row ever recorded for an agent, oldest first
    async fn factors(&self, agent_id: &AgentId) -> Result<Vec<TrustScoreFactor>>;
}

#[derive(Debug, Default)]
struct AgentLedger {
    factors: Vec<TrustScoreFactor>,
    history: Vec<TrustScoreHistoryEntry>,
}

/// In-memory [`TrustLedger`]
#[derive(Debug, Default)]
pub struct InMemoryTrustLedger {
    agents: RwLock<HashMap<AgentId, AgentLedger>>,
}

impl InMemoryTrustLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrustLedger for InMemoryTrustLedger {
    async fn append(
        &self,
        factors: Vec<TrustScoreFactor>,
        entry: TrustScoreHistoryEntry,
    ) -> Result<()> {
        let mut agents = self.agents.write().await;
        let ledger = agents.entry(entry.agent_id).or_default();
        ledger.factors.extend(factors);
        ledger.history.push(entry);
        Ok(())
    }

    async fn history(
        &self,
        agent_id: &AgentId,
        limit: usize,
    ) -> Result<Vec<TrustScoreHistoryEntry>> {
        let agents = self.agents.read().await;
        Ok(agents
            .get(agent_id)
            .map(|ledger| ledger.history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn factors(&self, agent_id: &AgentId) -> Result<Vec<TrustScoreFactor>> {
        let agents = self.agents.read().await;
        Ok(agents
            .get(agent_id)
            .map(|ledger| ledger.factors.clone())
            .unwrap_or_default())
    }
}

/// Latest trust score per agent.
///
/// Readers never wait on a recalculation; the calculator is the only writer.
#[derive(Debug, Default)]
pub struct TrustScoreCache {
    current: DashMap<AgentId, TrustScoreSnapshot>,
}

impl TrustScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot for an agent
    pub fn current(&self, agent_id: &AgentId) -> Option<TrustScoreSnapshot> {
        self.current.get(agent_id).map(|entry| entry.value().clone())
    }

    /// Most recent score for an agent
    pub fn score(&self, agent_id: &AgentId) -> Option<f64> {
        self.current.get(agent_id).map(|entry| entry.score)
    }

    /// Agents that have a score
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.current.iter().map(|entry| *entry.key()).collect()
    }

    /// Replace the snapshot unless a newer one is already cached, so that two
    /// overlapping recalculations cannot roll the score back.
    pub(crate) fn publish(&self, snapshot: TrustScoreSnapshot) {
        self.current
            .entry(snapshot.agent_id)
            .and_modify(|existing| {
                if snapshot.calculated_at >= existing.calculated_at {
                    *existing = snapshot.clone();
                }
            })
            .or_insert(snapshot);
    }
}
