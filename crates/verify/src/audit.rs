//! Audit trail of verification decisions.
//!
//! Records are append-only. The only later change is attaching the
//! execution outcome to an allowed record, exactly once. Each record also
//! carries the hash of the record appended before it, so rewriting history
//! is detectable with [`AuditStore::verify_chain`].

use std::collections::BTreeMap;
use std::sync::Arc;

use agentid_crypto::ContentHash;
use agentid_trust::RecalculationHandle;
use agentid_types::{
    ActionOutcome, ActionStatus, AgentId, AuditId, Decision, RecalculationReason, RecordState,
    VerificationRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{AuditError, Result, VerifyError};

/// Success and failure counts of logged outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeStats {
    pub succeeded: u64,
    pub failed: u64,
}

impl OutcomeStats {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Share of successful outcomes as a percentage, if any were logged
    pub fn success_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.succeeded as f64 / total as f64 * 100.0),
        }
    }
}

/// Storage for verification records
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a record. The store links it into the hash chain and returns
    /// the stored copy.
    async fn append(
        &self,
        record: VerificationRecord,
    ) -> std::result::Result<VerificationRecord, AuditError>;

    async fn get(
        &self,
        audit_id: &AuditId,
    ) -> std::result::Result<Option<VerificationRecord>, AuditError>;

    /// Attach an outcome to an allowed, not yet logged record. Checking the
    /// state and writing the outcome is one atomic step.
    async fn finalize(
        &self,
        audit_id: &AuditId,
        outcome: ActionOutcome,
        completed_at: DateTime<Utc>,
    ) -> std::result::Result<VerificationRecord, AuditError>;

    /// An agent's records in audit id order
    async fn records_for_agent(
        &self,
        agent_id: &AgentId,
    ) -> std::result::Result<Vec<VerificationRecord>, AuditError>;

    /// Allowed records without an outcome created before `cutoff`
    async fn unconfirmed(
        &self,
        cutoff: DateTime<Utc>,
    ) -> std::result::Result<Vec<VerificationRecord>, AuditError>;

    async fn outcome_stats(
        &self,
        agent_id: &AgentId,
    ) -> std::result::Result<OutcomeStats, AuditError>;

    /// Recompute every hash in append order
    async fn verify_chain(&self) -> std::result::Result<(), AuditError>;
}

/// Hash over the fields fixed at decision time, chained to `previous_hash`
pub(crate) fn record_hash(record: &VerificationRecord) -> ContentHash {
    let context = serde_json::to_vec(&record.context).unwrap_or_default();
    let score = record
        .trust_score_at_decision
        .map(|s| format!("{s:.2}"))
        .unwrap_or_default();
    let decision = match record.decision {
        Decision::Allowed => "allowed",
        Decision::Denied => "denied",
    };
    let audit_id = record.audit_id.to_string();
    let agent_id = record.agent_id.to_string();
    let created_at = record.created_at.to_rfc3339();

    ContentHash::of_fields([
        record.previous_hash.as_bytes(),
        audit_id.as_bytes(),
        agent_id.as_bytes(),
        record.action_type.as_bytes(),
        record.resource.as_bytes(),
        context.as_slice(),
        decision.as_bytes(),
        record.reason.as_bytes(),
        score.as_bytes(),
        created_at.as_bytes(),
    ])
}

#[derive(Debug)]
struct AuditLog {
    records: BTreeMap<AuditId, VerificationRecord>,
    /// Append order, which is chain order
    chain: Vec<AuditId>,
    head: ContentHash,
}

/// In-memory [`AuditStore`]
#[derive(Debug)]
pub struct InMemoryAuditStore {
    log: RwLock<AuditLog>,
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self {
            log: RwLock::new(AuditLog {
                records: BTreeMap::new(),
                chain: Vec::new(),
                head: ContentHash::genesis(),
            }),
        }
    }
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn tamper(&self, audit_id: &AuditId, resource: &str) {
        if let Some(record) = self.log.write().await.records.get_mut(audit_id) {
            record.resource = resource.to_string();
        }
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(
        &self,
        mut record: VerificationRecord,
    ) -> std::result::Result<VerificationRecord, AuditError> {
        let mut log = self.log.write().await;
        if log.records.contains_key(&record.audit_id) {
            return Err(AuditError::DuplicateId(record.audit_id));
        }

        record.previous_hash = log.head.to_string();
        let hash = record_hash(&record);
        record.record_hash = hash.to_string();

        log.head = hash;
        log.chain.push(record.audit_id);
        log.records.insert(record.audit_id, record.clone());
        Ok(record)
    }

    async fn get(
        &self,
        audit_id: &AuditId,
    ) -> std::result::Result<Option<VerificationRecord>, AuditError> {
        Ok(self.log.read().await.records.get(audit_id).cloned())
    }

    async fn finalize(
        &self,
        audit_id: &AuditId,
        outcome: ActionOutcome,
        completed_at: DateTime<Utc>,
    ) -> std::result::Result<VerificationRecord, AuditError> {
        let mut log = self.log.write().await;
        let record = log
            .records
            .get_mut(audit_id)
            .ok_or(AuditError::RecordNotFound(*audit_id))?;

        if record.state() != RecordState::Allowed {
            return Err(AuditError::AlreadyFinalized(*audit_id));
        }
        record.outcome = Some(outcome);
        record.completed_at = Some(completed_at);
        Ok(record.clone())
    }

    async fn records_for_agent(
        &self,
        agent_id: &AgentId,
    ) -> std::result::Result<Vec<VerificationRecord>, AuditError> {
        Ok(self
            .log
            .read()
            .await
            .records
            .values()
            .filter(|record| record.agent_id == *agent_id)
            .cloned()
            .collect())
    }

    async fn unconfirmed(
        &self,
        cutoff: DateTime<Utc>,
    ) -> std::result::Result<Vec<VerificationRecord>, AuditError> {
        Ok(self
            .log
            .read()
            .await
            .records
            .values()
            .filter(|record| record.state() == RecordState::Allowed && record.created_at < cutoff)
            .cloned()
            .collect())
    }

    async fn outcome_stats(
        &self,
        agent_id: &AgentId,
    ) -> std::result::Result<OutcomeStats, AuditError> {
        let log = self.log.read().await;
        let mut stats = OutcomeStats::default();
        for outcome in log
            .records
            .values()
            .filter(|record| record.agent_id == *agent_id)
            .filter_map(|record| record.outcome.as_ref())
        {
            match outcome.status {
                ActionStatus::Success => stats.succeeded += 1,
                ActionStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn verify_chain(&self) -> std::result::Result<(), AuditError> {
        let log = self.log.read().await;
        let mut previous = ContentHash::genesis().to_string();

        for audit_id in &log.chain {
            let record = log
                .records
                .get(audit_id)
                .ok_or(AuditError::ChainBroken(*audit_id))?;
            if record.previous_hash != previous
                || record_hash(record).as_str() != record.record_hash
            {
                return Err(AuditError::ChainBroken(*audit_id));
            }
            previous = record.record_hash.clone();
        }
        Ok(())
    }
}

/// Finalizes verification records once agents report what happened
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    recalculation: Option<RecalculationHandle>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            recalculation: None,
        }
    }

    /// Queue a trust recalculation after each logged result
    pub fn with_recalculation(mut self, handle: RecalculationHandle) -> Self {
        self.recalculation = Some(handle);
        self
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    pub async fn log_action_result(
        &self,
        audit_id: &AuditId,
        agent_id: Option<&AgentId>,
        status: ActionStatus,
        result: serde_json::Value,
    ) -> Result<VerificationRecord> {
        self.log_action_result_at(audit_id, agent_id, status, result, Utc::now())
            .await
    }

    /// Attach the execution outcome to an allowed record.
    ///
    /// When `agent_id` is given, a record of a different agent is reported
    /// as not found. Errors never alter the original decision.
    pub async fn log_action_result_at(
        &self,
        audit_id: &AuditId,
        agent_id: Option<&AgentId>,
        status: ActionStatus,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<VerificationRecord> {
        if let Some(agent_id) = agent_id {
            match self.store.get(audit_id).await? {
                Some(record) if record.agent_id == *agent_id => {}
                _ => return Err(VerifyError::RecordNotFound(*audit_id)),
            }
        }

        let record = self
            .store
            .finalize(audit_id, ActionOutcome { status, result }, now)
            .await?;
        info!(audit_id = %audit_id, agent_id = %record.agent_id, %status, "action result logged");

        if let Some(handle) = &self.recalculation {
            if let Err(e) = handle.try_enqueue(record.agent_id, RecalculationReason::ActionResult) {
                warn!(agent_id = %record.agent_id, "could not queue recalculation: {}", e);
            }
        }
        Ok(record)
    }

    pub async fn records_for_agent(&self, agent_id: &AgentId) -> Result<Vec<VerificationRecord>> {
        Ok(self.store.records_for_agent(agent_id).await?)
    }

    /// Allowed records still waiting for a result `older_than` after the
    /// decision
    pub async fn unconfirmed(
        &self,
        older_than: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<VerificationRecord>> {
        Ok(self.store.unconfirmed(now - older_than).await?)
    }

    pub async fn verify_chain(&self) -> Result<()> {
        Ok(self.store.verify_chain().await?)
    }
}
