use agentid_types::{AgentId, AlertId, SecurityAlert, Severity};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::{Result, TrustError};

/// Score delta applied for each open alert of a given severity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertImpactTable {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub info: f64,
}

impl Default for AlertImpactTable {
    fn default() -> Self {
        Self {
            critical: -20.0,
            high: -10.0,
            medium: -5.0,
            low: -3.0,
            info: -2.0,
        }
    }
}

impl AlertImpactTable {
    pub fn impact(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    /// Impacts are penalties: each must be a finite number no greater than zero
    pub fn validate(&self) -> Result<()> {
        let all = [self.critical, self.high, self.medium, self.low, self.info];
        if all.iter().any(|impact| !impact.is_finite() || *impact > 0.0) {
            return Err(TrustError::ConfigError(
                "alert impacts must be finite and not positive".into(),
            ));
        }
        Ok(())
    }
}

/// Security alerts raised against agents
#[derive(Debug, Default)]
pub struct AlertStore {
    alerts: RwLock<Vec<SecurityAlert>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, alert: SecurityAlert) {
        info!(
            agent_id = %alert.agent_id,
            alert_id = %alert.id,
            severity = %alert.severity,
            impact = alert.trust_score_impact,
            "security alert raised"
        );
        self.alerts.write().await.push(alert);
    }

    /// Mark an alert as handled; it stops counting against the agent's score
    pub async fn acknowledge(&self, alert_id: &AlertId) -> Result<SecurityAlert> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .iter_mut()
            .find(|alert| alert.id == *alert_id)
            .ok_or(TrustError::AlertNotFound(*alert_id))?;
        alert.acknowledged = true;
        Ok(alert.clone())
    }

    /// All alerts for an agent in the order they were raised
    pub async fn for_agent(&self, agent_id: &AgentId) -> Vec<SecurityAlert> {
        self.alerts
            .read()
            .await
            .iter()
            .filter(|alert| alert.agent_id == *agent_id)
            .cloned()
            .collect()
    }

    pub async fn open_for_agent(&self, agent_id: &AgentId) -> Vec<SecurityAlert> {
        self.alerts
            .read()
            .await
            .iter()
            .filter(|alert| alert.agent_id == *agent_id && !alert.acknowledged)
            .cloned()
            .collect()
    }

    /// Sum of the declared impacts of unacknowledged alerts
    pub async fn open_impact(&self, agent_id: &AgentId) -> f64 {
        self.alerts
            .read()
            .await
            .iter()
            .filter(|alert| alert.agent_id == *agent_id && !alert.acknowledged)
            .map(|alert| alert.trust_score_impact)
            .sum()
    }
}
