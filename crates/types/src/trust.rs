use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AgentId;

/// The eight evidence factors behind a trust score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustFactorKind {
    VerificationStatus,
    Uptime,
    SuccessRate,
    SecurityAlerts,
    Compliance,
    Age,
    DriftDetection,
    UserFeedback,
}

impl TrustFactorKind {
    pub const ALL: [TrustFactorKind; 8] = [
        Self::VerificationStatus,
        Self::Uptime,
        Self::SuccessRate,
        Self::SecurityAlerts,
        Self::Compliance,
        Self::Age,
        Self::DriftDetection,
        Self::UserFeedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerificationStatus => "verification_status",
            Self::Uptime => "uptime",
            Self::SuccessRate => "success_rate",
            Self::SecurityAlerts => "security_alerts",
            Self::Compliance => "compliance",
            Self::Age => "age",
            Self::DriftDetection => "drift_detection",
            Self::UserFeedback => "user_feedback",
        }
    }
}

impl fmt::Display for TrustFactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One factor of one recalculation. Rows are appended, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreFactor {
    pub agent_id: AgentId,
    pub factor: TrustFactorKind,
    /// Normalized value, 0 to 100
    pub value: f64,
    pub weight: f64,
    /// `value * weight`
    pub contribution: f64,
    pub calculated_at: DateTime<Utc>,
}

/// Why a recalculation ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalculationReason {
    Registration,
    Manual,
    Scheduled,
    PostCapabilityReport,
    ActionResult,
}

impl fmt::Display for RecalculationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Registration => "initial calculation at registration",
            Self::Manual => "manual recalculation",
            Self::Scheduled => "scheduled",
            Self::PostCapabilityReport => "post-capability-report",
            Self::ActionResult => "post-action-result",
        };
        f.write_str(text)
    }
}

/// One entry of the append-only score history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreHistoryEntry {
    pub agent_id: AgentId,
    pub score: f64,
    /// Human-readable reason, e.g. "manual recalculation"
    pub reason: String,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// No trust established
    #[default]
    None,
    /// Basic trust level
    Low,
    /// Moderate trust level
    Medium,
    /// High trust level
    High,
    /// Very high trust level
    VeryHigh,
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::VeryHigh => write!(f, "Very High"),
        }
    }
}
