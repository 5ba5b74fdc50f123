use std::fmt;

use agentid_core::CoreError;
use agentid_trust::TrustError;
use agentid_types::{AgentId, AuditId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by verification, logging and drift operations.
///
/// Denials are not errors: every denial kind is a [`DenialReason`] inside
/// the decision. Only an unknown agent fails `verify_action` outright.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Verification record not found: {0}")]
    RecordNotFound(AuditId),

    #[error("Verification record already finalized: {0}")]
    AlreadyFinalized(AuditId),

    #[error("Invalid capability report: {0}")]
    InvalidReport(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error("Audit store error: {0}")]
    Audit(String),
}

impl From<AuditError> for VerifyError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::RecordNotFound(id) => VerifyError::RecordNotFound(id),
            AuditError::AlreadyFinalized(id) => VerifyError::AlreadyFinalized(id),
            other => VerifyError::Audit(other.to_string()),
        }
    }
}

/// Errors raised by an audit store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("Verification record not found: {0}")]
    RecordNotFound(AuditId),

    #[error("Verification record already finalized: {0}")]
    AlreadyFinalized(AuditId),

    #[error("Duplicate audit id: {0}")]
    DuplicateId(AuditId),

    #[error("Audit chain broken at record {0}")]
    ChainBroken(AuditId),

    #[error("Audit store unavailable: {0}")]
    Unavailable(String),
}

/// Why an action was denied. Rendered into the decision's `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenialReason {
    AgentNotActive,
    NoCapabilities,
    NoMatchingCapability { detail: Option<String> },
    CapabilityDenied { detail: String },
    RateLimitExceeded { retry_after_secs: u64 },
    OutsideAllowedWindow,
    VerificationUnavailable,
}

impl DenialReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::AgentNotActive => "agent_not_active",
            Self::NoCapabilities => "no_capabilities",
            Self::NoMatchingCapability { .. } => "no_matching_capability",
            Self::CapabilityDenied { .. } => "capability_denied",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::OutsideAllowedWindow => "outside_allowed_window",
            Self::VerificationUnavailable => "verification_unavailable",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AgentNotActive => f.write_str("agent not active"),
            Self::NoCapabilities => f.write_str("no capabilities granted"),
            Self::NoMatchingCapability { detail: None } => f.write_str("no matching capability"),
            Self::NoMatchingCapability {
                detail: Some(detail),
            } => write!(f, "no matching capability: {detail}"),
            Self::CapabilityDenied { detail } => write!(f, "capability denied: {detail}"),
            Self::RateLimitExceeded { .. } => f.write_str("rate limit exceeded"),
            Self::OutsideAllowedWindow => f.write_str("outside allowed window"),
            Self::VerificationUnavailable => f.write_str("verification unavailable"),
        }
    }
}
