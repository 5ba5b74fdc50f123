use agentid_types::AgentId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::{Result, TrustError};

/// Externally sourced evidence about an agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSignals {
    /// Uptime percentage reported by monitoring
    pub uptime_percent: Option<f64>,
    /// Share of passed compliance checks, as a percentage
    pub compliance_percent: Option<f64>,
    /// User feedback ratings, 1 to 5
    pub feedback_ratings: Vec<u8>,
}

impl AgentSignals {
    /// Mean feedback mapped onto 0 to 100 (1 is 0, 5 is 100)
    pub fn feedback_score(&self) -> Option<f64> {
        if self.feedback_ratings.is_empty() {
            return None;
        }
        let total: f64 = self.feedback_ratings.iter().map(|r| f64::from(*r)).sum();
        let mean = total / self.feedback_ratings.len() as f64;
        Some((mean - 1.0) * 25.0)
    }
}

/// Store for signals pushed by monitoring, compliance checks and users
#[derive(Debug, Default)]
pub struct SignalStore {
    signals: DashMap<AgentId, AgentSignals>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_uptime(&self, agent_id: AgentId, percent: f64) -> Result<()> {
        let percent = check_percent("uptime", percent)?;
        self.signals.entry(agent_id).or_default().uptime_percent = Some(percent);
        Ok(())
    }

    pub fn set_compliance(&self, agent_id: AgentId, percent: f64) -> Result<()> {
        let percent = check_percent("compliance", percent)?;
        self.signals.entry(agent_id).or_default().compliance_percent = Some(percent);
        Ok(())
    }

    pub fn add_feedback(&self, agent_id: AgentId, rating: u8) -> Result<()> {
        if !(1..=5).contains(&rating) {
            return Err(TrustError::InvalidRating(rating));
        }
        self.signals
            .entry(agent_id)
            .or_default()
            .feedback_ratings
            .push(rating);
        Ok(())
    }

    pub fn signals(&self, agent_id: &AgentId) -> AgentSignals {
        self.signals
            .get(agent_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

fn check_percent(name: &str, value: f64) -> Result<f64> {
    if !(0.0..=100.0).contains(&value) {
        return Err(TrustError::InvalidFactor(format!(
            "{name} must be a percentage, got {value}"
        )));
    }
    Ok(value)
}
