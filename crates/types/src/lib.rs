//! Shared types and traits for the AgentID verification engine
//!
//! Everything that crosses a crate boundary lives here: identifiers, the
//! agent record, capability grants and their typed scopes, verification
//! records, trust score factors and security alerts.

use thiserror::Error;

mod action;
mod agent;
mod alert;
mod capability;
mod ids;
mod record;
mod trust;

pub use action::{ActionContext, ActionRequest};
pub use agent::{Agent, AgentKind, AgentStatus, NewAgent};
pub use alert::{RiskLevel, SecurityAlert, Severity};
pub use capability::{
    BrowserScope, CapabilityGrant, CapabilityScope, CapabilitySpec, CapabilityType,
    CodeExecutionScope, CredentialScope, DatabaseScope, FileSystemScope, HourRange, NetworkScope,
    RateLimits, Schedule, ScopeKind,
};
pub use ids::{AgentId, AlertId, AuditId, AuditIdGenerator, GrantId, OrganizationId};
pub use record::{ActionOutcome, ActionStatus, Decision, RecordState, VerificationRecord};
pub use trust::{
    RecalculationReason, TrustFactorKind, TrustLevel, TrustScoreFactor, TrustScoreHistoryEntry,
};

/// Errors raised while parsing or validating shared types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    #[error("Unknown capability type: {0}")]
    UnknownCapabilityType(String),
    #[error("Unknown action status: {0}")]
    UnknownActionStatus(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
