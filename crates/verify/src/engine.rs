//! The verification engine.
//!
//! `verify_action` is the synchronous authorization path: every dependency
//! call is bounded by the configured timeout, and a dependency that fails or
//! times out turns into a deny. Nothing on this path ever allows by default.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use agentid_core::{AgentRegistry, CapabilityStore, ScopeCache, ScopeMatch};
use agentid_trust::TrustScoreCache;
use agentid_types::{
    ActionRequest, AuditId, AuditIdGenerator, CapabilityGrant, CapabilityType, Decision,
    OrganizationId, VerificationRecord,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::tracker::RateSlot;
use crate::{
    AuditStore, DenialReason, RateKey, RateWindowTracker, Result, VerifierConfig, VerifyError,
};

const ALLOWED: &str = "allowed";

/// Answer to a verification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationDecision {
    pub allowed: bool,
    pub reason: String,
    pub audit_id: AuditId,
    /// Structured reason, present on denials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial: Option<DenialReason>,
    /// Cached trust score at decision time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
}

/// Decides whether agents may perform actions and records every decision
#[derive(Clone)]
pub struct VerificationEngine {
    registry: Arc<dyn AgentRegistry>,
    capabilities: Arc<dyn CapabilityStore>,
    tracker: Arc<RateWindowTracker>,
    scores: Arc<TrustScoreCache>,
    audit: Arc<dyn AuditStore>,
    ids: Arc<AuditIdGenerator>,
    scopes: Arc<ScopeCache>,
    config: VerifierConfig,
}

impl VerificationEngine {
    pub fn new(
        registry: Arc<dyn AgentRegistry>,
        capabilities: Arc<dyn CapabilityStore>,
        tracker: Arc<RateWindowTracker>,
        scores: Arc<TrustScoreCache>,
        audit: Arc<dyn AuditStore>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            registry,
            capabilities,
            tracker,
            scores,
            audit,
            ids: Arc::new(AuditIdGenerator::new()),
            scopes: Arc::new(ScopeCache::new()),
            config,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<RateWindowTracker> {
        &self.tracker
    }

    /// Compiled grant scopes, filled lazily by `verify_action`
    pub fn scopes(&self) -> &Arc<ScopeCache> {
        &self.scopes
    }

    pub async fn verify_action(&self, request: &ActionRequest) -> Result<VerificationDecision> {
        self.verify_action_at(request, Utc::now()).await
    }

    /// Verify an action as of `now`.
    ///
    /// Returns `Err(AgentNotFound)` for an unknown agent. Every other
    /// outcome, including dependency failures, is a decision that has been
    /// written to the audit trail.
    pub async fn verify_action_at(
        &self,
        request: &ActionRequest,
        now: DateTime<Utc>,
    ) -> Result<VerificationDecision> {
        self.verify(request, None, now).await
    }

    /// Verify an action on behalf of one organization. An agent owned by
    /// another organization is reported as `AgentNotFound`; the ownership
    /// check shares the bounded registry lookup.
    pub async fn verify_action_for(
        &self,
        organization_id: &OrganizationId,
        request: &ActionRequest,
    ) -> Result<VerificationDecision> {
        self.verify(request, Some(organization_id), Utc::now()).await
    }

    #[instrument(
        name = "verify_action",
        skip_all,
        fields(agent_id = %request.agent_id, action_type = %request.action_type)
    )]
    async fn verify(
        &self,
        request: &ActionRequest,
        organization_id: Option<&OrganizationId>,
        now: DateTime<Utc>,
    ) -> Result<VerificationDecision> {
        let trust_score = self.scores.score(&request.agent_id);

        let agent = match self
            .bounded("agent registry", self.registry.get(&request.agent_id))
            .await
        {
            Some(Some(agent))
                if organization_id.map_or(true, |org| agent.organization_id == *org) =>
            {
                agent
            }
            Some(_) => return Err(VerifyError::AgentNotFound(request.agent_id)),
            None => {
                let verdict = Err(DenialReason::VerificationUnavailable);
                return Ok(self
                    .record(request, now, verdict, trust_score, Vec::new())
                    .await);
            }
        };

        let outcome = self.decide(request, agent.is_active(), trust_score, now).await;
        let (verdict, slots) = match outcome {
            Ok(slots) => (Ok(()), slots),
            Err(denial) => (Err(denial), Vec::new()),
        };
        Ok(self.record(request, now, verdict, trust_score, slots).await)
    }

    /// Steps 1 to 6 of the decision. On allow, returns the rate slots taken.
    async fn decide(
        &self,
        request: &ActionRequest,
        agent_active: bool,
        trust_score: Option<f64>,
        now: DateTime<Utc>,
    ) -> std::result::Result<Vec<RateSlot>, DenialReason> {
        if !agent_active {
            return Err(DenialReason::AgentNotActive);
        }

        let grants = self
            .bounded(
                "capability store",
                self.capabilities.unrevoked_capabilities(&request.agent_id),
            )
            .await
            .ok_or(DenialReason::VerificationUnavailable)?;
        if grants.is_empty() {
            return Err(DenialReason::NoCapabilities);
        }

        let Ok(capability) = request.action_type.parse::<CapabilityType>() else {
            return Err(DenialReason::NoMatchingCapability {
                detail: Some(format!("unknown action type '{}'", request.action_type)),
            });
        };

        let mut allowing: Vec<&CapabilityGrant> = Vec::new();
        let mut mismatch = None;
        for grant in grants.iter().filter(|g| g.capability_type() == capability) {
            match self
                .scopes
                .evaluate(grant, &request.resource, &request.context, trust_score)
            {
                ScopeMatch::Forbidden(detail) => {
                    debug!(grant_id = %grant.id, %detail, "grant forbids resource");
                    return Err(DenialReason::CapabilityDenied { detail });
                }
                ScopeMatch::NotAllowed(detail) => {
                    mismatch.get_or_insert(detail);
                }
                ScopeMatch::Allowed => allowing.push(grant),
            }
        }
        if allowing.is_empty() {
            return Err(DenialReason::NoMatchingCapability { detail: mismatch });
        }

        let mut slots = Vec::with_capacity(allowing.len());
        for grant in allowing {
            if !RateWindowTracker::window_admits(grant.spec.schedule.as_ref(), now) {
                warn!(grant_id = %grant.id, "action outside allowed window");
                self.release(slots);
                return Err(DenialReason::OutsideAllowedWindow);
            }

            let key = RateKey::new(request.agent_id, grant.id);
            match self.tracker.try_acquire(key, &grant.spec.limits, now) {
                Ok(slot) => slots.push(slot),
                Err(exceeded) => {
                    warn!(grant_id = %grant.id, %exceeded, "rate limit exceeded");
                    self.release(slots);
                    return Err(DenialReason::RateLimitExceeded {
                        retry_after_secs: exceeded.retry_after_secs,
                    });
                }
            }
        }
        Ok(slots)
    }

    /// Persist the decision and build the response. An allow that cannot be
    /// persisted becomes a deny and gives its rate slots back.
    async fn record(
        &self,
        request: &ActionRequest,
        now: DateTime<Utc>,
        verdict: std::result::Result<(), DenialReason>,
        trust_score: Option<f64>,
        slots: Vec<RateSlot>,
    ) -> VerificationDecision {
        let audit_id = self.ids.next_id(now);
        let denial = verdict.err();
        let record = VerificationRecord {
            audit_id,
            agent_id: request.agent_id,
            action_type: request.action_type.clone(),
            resource: request.resource.clone(),
            context: request.context.clone(),
            decision: if denial.is_none() {
                Decision::Allowed
            } else {
                Decision::Denied
            },
            reason: reason_text(denial.as_ref()),
            trust_score_at_decision: trust_score,
            created_at: now,
            completed_at: None,
            outcome: None,
            previous_hash: String::new(),
            record_hash: String::new(),
        };

        let persisted = self
            .bounded("audit store", self.audit.append(record))
            .await
            .is_some();

        let denial = match denial {
            None if !persisted => {
                warn!(%audit_id, "allow could not be recorded, denying");
                self.release(slots);
                Some(DenialReason::VerificationUnavailable)
            }
            denial => denial,
        };

        match &denial {
            None => debug!(%audit_id, "action allowed"),
            Some(reason) => debug!(%audit_id, code = reason.code(), "action denied"),
        }

        VerificationDecision {
            allowed: denial.is_none(),
            reason: reason_text(denial.as_ref()),
            audit_id,
            denial,
            trust_score,
        }
    }

    fn release(&self, slots: Vec<RateSlot>) {
        for slot in slots {
            self.tracker.release(slot);
        }
    }

    /// Run a dependency call under the timeout; `None` on error or timeout
    async fn bounded<T, E: Display>(
        &self,
        dependency: &'static str,
        call: impl Future<Output = std::result::Result<T, E>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.config.dependency_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                error!(dependency, "dependency failed: {}", e);
                None
            }
            Err(_) => {
                error!(dependency, timeout = ?self.config.dependency_timeout, "dependency timed out");
                None
            }
        }
    }
}

fn reason_text(denial: Option<&DenialReason>) -> String {
    denial.map_or_else(|| ALLOWED.to_string(), ToString::to_string)
}
