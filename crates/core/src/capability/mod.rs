//! Capability grants and scope matching.
//!
//! Grants are appended and logically revoked, never deleted. A grant is
//! active while it is unrevoked and its schedule admits the current time.

mod matcher;
mod store;

use agentid_types::{
    AgentId, CapabilityGrant, CapabilityScope, CapabilitySpec, GrantId, Schedule,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::Glob;

pub use matcher::{evaluate_scope, ScopeCache, ScopeMatch, ScopeMatcher};
pub use store::InMemoryCapabilityStore;

use crate::{CoreError, Result};

/// Storage of capability grants
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    /// Grants that are unrevoked and whose schedule admits `at`
    async fn active_capabilities(
        &self,
        agent_id: &AgentId,
        at: DateTime<Utc>,
    ) -> Result<Vec<CapabilityGrant>>;

    /// Grants that are unrevoked, regardless of schedule
    async fn unrevoked_capabilities(&self, agent_id: &AgentId) -> Result<Vec<CapabilityGrant>>;

    /// Every grant ever made to the agent, including revoked ones
    async fn list_capabilities(&self, agent_id: &AgentId) -> Result<Vec<CapabilityGrant>>;

    /// Validate and append a new grant
    async fn grant_capability(
        &self,
        agent_id: &AgentId,
        spec: CapabilitySpec,
    ) -> Result<CapabilityGrant>;

    /// Mark a grant revoked. Revoking an already revoked grant is not an
    /// error and leaves the original revocation time in place.
    async fn revoke_capability(
        &self,
        agent_id: &AgentId,
        grant_id: &GrantId,
    ) -> Result<CapabilityGrant>;
}

/// Check a spec before it is granted.
///
/// An allow-list and a deny-list naming the same entry is accepted; the
/// deny-list wins at match time.
pub fn validate_spec(spec: &CapabilitySpec) -> Result<()> {
    if let Some(scope) = &spec.scope {
        let expected = spec.capability_type.scope_kind();
        if scope.kind() != expected {
            return Err(invalid(format!(
                "{} grants take a {:?} scope, got {:?}",
                spec.capability_type,
                expected,
                scope.kind()
            )));
        }
        validate_scope(scope)?;
    }

    if spec.limits.max_per_minute == Some(0) || spec.limits.max_per_hour == Some(0) {
        return Err(invalid("rate limits must be at least 1 when set"));
    }

    if let Some(schedule) = &spec.schedule {
        validate_schedule(schedule)?;
    }

    if let Some(min) = spec.min_trust_score {
        if !(0.0..=100.0).contains(&min) {
            return Err(invalid(format!("min_trust_score {min} must be within 0..=100")));
        }
    }

    Ok(())
}

fn validate_scope(scope: &CapabilityScope) -> Result<()> {
    for pattern in scope.patterns() {
        if pattern.trim().is_empty() {
            return Err(invalid("scope patterns must not be empty"));
        }
    }

    match scope {
        CapabilityScope::FileSystem(s) => {
            check_globs(s.allowed_paths.iter().chain(&s.forbidden_paths))
        }
        CapabilityScope::Database(s) => {
            check_globs(s.allowed_tables.iter().chain(&s.forbidden_tables))
        }
        CapabilityScope::Credential(s) => {
            check_globs(s.allowed_secrets.iter().chain(&s.forbidden_secrets))
        }
        CapabilityScope::Network(s) => {
            if s.allowed_ports.contains(&0) {
                return Err(invalid("port 0 cannot be allowed"));
            }
            check_domains(s.allowed_domains.iter().chain(&s.forbidden_domains))
        }
        CapabilityScope::Browser(s) => {
            check_domains(s.allowed_domains.iter().chain(&s.forbidden_domains))
        }
        CapabilityScope::CodeExecution(_) => Ok(()),
    }
}

fn check_globs<'a>(patterns: impl Iterator<Item = &'a String>) -> Result<()> {
    for pattern in patterns {
        Glob::new(pattern)
            .map_err(|e| invalid(format!("invalid pattern '{pattern}': {e}")))?;
    }
    Ok(())
}

/// Domain patterns are exact hosts, `*`, or a single leading `*.` wildcard
fn check_domains<'a>(patterns: impl Iterator<Item = &'a String>) -> Result<()> {
    for pattern in patterns {
        let rest = pattern.strip_prefix("*.").unwrap_or(pattern);
        if pattern != "*" && (rest.contains('*') || rest.contains(char::is_whitespace)) {
            return Err(invalid(format!("invalid domain pattern '{pattern}'")));
        }
    }
    Ok(())
}

fn validate_schedule(schedule: &Schedule) -> Result<()> {
    if let Some(hours) = schedule.allowed_hours {
        if hours.start > 23 || hours.end > 24 {
            return Err(invalid("allowed hours must be within 0..24"));
        }
        if hours.start == hours.end {
            return Err(invalid("allowed hours range is empty"));
        }
    }
    if schedule.utc_offset_minutes.abs() >= 24 * 60 {
        return Err(invalid("utc offset must be less than a day"));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::InvalidCapability(message.into())
}
