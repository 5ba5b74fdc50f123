use std::sync::Arc;

use agentid_core::AgentRegistry;
use agentid_trust::{AlertStore, FactorInputs, FactorProvider, SignalStore, TrustError};
use agentid_types::{AgentId, AgentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AuditStore, DriftStats};

/// Days after which an agent's age factor is maxed out
const AGE_FOR_FULL_CREDIT_DAYS: f64 = 90.0;

/// Neutral value for factors with no evidence yet
const NEUTRAL: f64 = 50.0;

/// Gathers factor inputs from the platform's own stores
pub struct PlatformFactorProvider {
    registry: Arc<dyn AgentRegistry>,
    audit: Arc<dyn AuditStore>,
    alerts: Arc<AlertStore>,
    signals: Arc<SignalStore>,
    drift: Arc<DriftStats>,
}

impl PlatformFactorProvider {
    pub fn new(
        registry: Arc<dyn AgentRegistry>,
        audit: Arc<dyn AuditStore>,
        alerts: Arc<AlertStore>,
        signals: Arc<SignalStore>,
        drift: Arc<DriftStats>,
    ) -> Self {
        Self {
            registry,
            audit,
            alerts,
            signals,
            drift,
        }
    }
}

fn status_value(status: AgentStatus) -> f64 {
    match status {
        AgentStatus::Verified => 100.0,
        AgentStatus::Pending => 50.0,
        AgentStatus::Suspended => 10.0,
        AgentStatus::Revoked => 0.0,
    }
}

#[async_trait]
impl FactorProvider for PlatformFactorProvider {
    async fn factor_inputs(
        &self,
        agent_id: &AgentId,
        at: DateTime<Utc>,
    ) -> agentid_trust::Result<FactorInputs> {
        let agent = self
            .registry
            .get(agent_id)
            .await
            .map_err(|e| TrustError::FactorUnavailable(e.to_string()))?
            .ok_or_else(|| TrustError::FactorUnavailable(format!("agent {agent_id} not found")))?;

        let stats = self
            .audit
            .outcome_stats(agent_id)
            .await
            .map_err(|e| TrustError::FactorUnavailable(e.to_string()))?;
        let signals = self.signals.signals(agent_id);
        let age_days = (at - agent.created_at).num_seconds().max(0) as f64 / 86_400.0;

        Ok(FactorInputs {
            verification_status: status_value(agent.status),
            uptime: signals.uptime_percent.unwrap_or(100.0),
            success_rate: stats.success_rate().unwrap_or(NEUTRAL),
            security_alerts: 100.0 + self.alerts.open_impact(agent_id).await,
            compliance: signals.compliance_percent.unwrap_or(100.0),
            age: (age_days / AGE_FOR_FULL_CREDIT_DAYS * 100.0).min(100.0),
            drift_detection: self.drift.drift_score(agent_id).unwrap_or(100.0),
            user_feedback: signals.feedback_score().unwrap_or(NEUTRAL),
        })
    }
}
