use agentid_types::{AgentId, TrustFactorKind, TrustLevel, TrustScoreFactor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::FactorWeights;

/// Normalized inputs for one recalculation, each on a 0 to 100 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorInputs {
    pub verification_status: f64,
    pub uptime: f64,
    pub success_rate: f64,
    pub security_alerts: f64,
    pub compliance: f64,
    pub age: f64,
    pub drift_detection: f64,
    pub user_feedback: f64,
}

impl FactorInputs {
    /// The same value for every factor
    pub fn uniform(value: f64) -> Self {
        Self {
            verification_status: value,
            uptime: value,
            success_rate: value,
            security_alerts: value,
            compliance: value,
            age: value,
            drift_detection: value,
            user_feedback: value,
        }
    }

    /// Raw input for a factor, before clamping
    pub fn get(&self, factor: TrustFactorKind) -> f64 {
        match factor {
            TrustFactorKind::VerificationStatus => self.verification_status,
            TrustFactorKind::Uptime => self.uptime,
            TrustFactorKind::SuccessRate => self.success_rate,
            TrustFactorKind::SecurityAlerts => self.security_alerts,
            TrustFactorKind::Compliance => self.compliance,
            TrustFactorKind::Age => self.age,
            TrustFactorKind::DriftDetection => self.drift_detection,
            TrustFactorKind::UserFeedback => self.user_feedback,
        }
    }

    /// Input for a factor clamped to [0, 100]. NaN counts as zero.
    pub fn normalized(&self, factor: TrustFactorKind) -> f64 {
        clamp_unit(self.get(factor))
    }

    /// Build the eight factor rows for an agent
    pub fn to_factors(
        &self,
        agent_id: AgentId,
        weights: &FactorWeights,
        calculated_at: DateTime<Utc>,
    ) -> Vec<TrustScoreFactor> {
        TrustFactorKind::ALL
            .iter()
            .map(|factor| {
                let value = self.normalized(*factor);
                let weight = weights.weight(*factor);
                TrustScoreFactor {
                    agent_id,
                    factor: *factor,
                    value,
                    weight,
                    contribution: value * weight,
                    calculated_at,
                }
            })
            .collect()
    }
}

/// Composite of a set of factor rows: sum of contributions, clamped to
/// [0, 100] and rounded to two decimals
pub fn composite_score(factors: &[TrustScoreFactor]) -> f64 {
    let total: f64 = factors.iter().map(|f| f.contribution).sum();
    round_two_decimals(clamp_unit(total))
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Determine trust level from a score
pub fn determine_trust_level(score: f64, thresholds: &[(TrustLevel, f64)]) -> TrustLevel {
    let mut level = TrustLevel::None;
    for (trust_level, threshold) in thresholds {
        if score >= *threshold {
            level = *trust_level;
        } else {
            break;
        }
    }
    level
}

/// Result of one recalculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreSnapshot {
    pub agent_id: AgentId,
    /// Composite score, 0 to 100 with two decimals
    pub score: f64,
    pub level: TrustLevel,
    pub factors: Vec<TrustScoreFactor>,
    pub calculated_at: DateTime<Utc>,
    pub reason: String,
}
