//! Runtime verification for AgentID
//!
//! This crate decides, for every in-flight action, whether an agent may
//! perform it, and keeps the trail that decision leaves behind:
//! - The verification engine and its fail-closed dependency handling
//! - Per-grant sliding-window rate accounting and schedule checks
//! - The hash-chained audit trail and post-hoc action results
//! - Drift detection over agent-reported capability usage
//! - The platform trust factor provider feeding the trust calculator

mod audit;
mod drift;
mod engine;
mod error;
mod factors;
mod tracker;

use std::time::Duration;

pub use audit::{AuditRecorder, AuditStore, InMemoryAuditStore, OutcomeStats};
pub use drift::{
    CapabilityReport, Discrepancy, DiscrepancyKind, DriftAssessment, DriftDetector, DriftStats,
    ReportedCapability,
};
pub use engine::{VerificationDecision, VerificationEngine};
pub use error::{AuditError, DenialReason, VerifyError};
pub use factors::PlatformFactorProvider;
pub use tracker::{RateKey, RateLimitExceeded, RateSlot, RateUsage, RateWindowTracker};

/// Result type for verification operations
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Verification engine configuration
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Upper bound for each dependency call on the verify path
    pub dependency_timeout: Duration,
    /// Allowed records without a reported outcome older than this are
    /// listed as unconfirmed
    pub unconfirmed_after: chrono::Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            dependency_timeout: Duration::from_millis(25),
            unconfirmed_after: chrono::Duration::minutes(5),
        }
    }
}
