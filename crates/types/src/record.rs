use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActionContext, AgentId, AuditId, TypesError};

/// Outcome of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Execution status an agent reports after acting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" | "succeeded" => Ok(Self::Success),
            "failed" | "failure" => Ok(Self::Failed),
            _ => Err(TypesError::UnknownActionStatus(s.to_string())),
        }
    }
}

/// Post-hoc execution outcome attached by log-action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    #[serde(default)]
    pub result: serde_json::Value,
}

/// Derived lifecycle state of a [`VerificationRecord`].
///
/// `Allowed` records are awaiting their execution report; an allowed record
/// that is never reported stays valid and shows up as unconfirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Allowed,
    Denied,
    Logged,
}

/// The audit unit: one authorization decision and its eventual outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub audit_id: AuditId,
    pub agent_id: AgentId,
    pub action_type: String,
    pub resource: String,
    #[serde(default)]
    pub context: ActionContext,
    pub decision: Decision,
    pub reason: String,
    /// Cached trust score at decision time, if one had been computed
    pub trust_score_at_decision: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub outcome: Option<ActionOutcome>,
    /// Hash of the record appended before this one
    pub previous_hash: String,
    /// Hash over the immutable decision fields and `previous_hash`
    pub record_hash: String,
}

impl VerificationRecord {
    pub fn state(&self) -> RecordState {
        match (self.decision, &self.outcome) {
            (Decision::Denied, _) => RecordState::Denied,
            (Decision::Allowed, None) => RecordState::Allowed,
            (Decision::Allowed, Some(_)) => RecordState::Logged,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state() != RecordState::Allowed
    }
}
