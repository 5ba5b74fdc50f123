//! Drift detection over agent capability reports.
//!
//! Agents periodically report which capabilities they used and on what.
//! The detector compares each report with the agent's active grants and
//! raises a security alert per discrepancy. Reports are processed off the
//! verification path; the only link back is a queued trust recalculation.

use std::sync::Arc;

use agentid_core::{evaluate_scope, AgentRegistry, CapabilityStore, ScopeMatch};
use agentid_crypto::{PublicKey, Signature};
use agentid_trust::{AlertImpactTable, AlertStore, RecalculationHandle};
use agentid_types::{
    ActionContext, AgentId, AlertId, CapabilityGrant, CapabilityType, RecalculationReason,
    RiskLevel, SecurityAlert, Severity,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Result, VerifyError};

/// One capability as reported by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedCapability {
    /// Capability type name, kept as sent so unknown names can be flagged
    #[serde(alias = "type")]
    pub capability_type: String,
    #[serde(default)]
    pub resources: Vec<String>,
    /// Uses over the last hour
    #[serde(default)]
    pub usage_count: u64,
}

/// Self-reported capability usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub agent_id: AgentId,
    pub reported_at: DateTime<Utc>,
    pub capabilities: Vec<ReportedCapability>,
    /// Base64 Ed25519 signature over [`CapabilityReport::signing_payload`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Serialize)]
struct SignedFields<'a> {
    agent_id: &'a AgentId,
    reported_at: &'a DateTime<Utc>,
    capabilities: &'a [ReportedCapability],
}

impl CapabilityReport {
    /// Canonical bytes the agent signs: the report as JSON without its
    /// signature
    pub fn signing_payload(&self) -> Vec<u8> {
        serde_json::to_vec(&SignedFields {
            agent_id: &self.agent_id,
            reported_at: &self.reported_at,
            capabilities: &self.capabilities,
        })
        .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// A capability the agent holds no active grant for
    UngrantedCapability,
    /// A resource some grant explicitly forbids
    ForbiddenResource,
    /// A resource no grant of that type covers
    OutOfScopeResource,
    /// More uses than the grants' hourly limit
    ExcessiveUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub capability_type: String,
    pub resource: Option<String>,
    pub severity: Severity,
    pub message: String,
}

/// Result of assessing one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAssessment {
    pub agent_id: AgentId,
    pub risk_level: RiskLevel,
    /// Sum of the alerts' impacts, never positive
    pub trust_score_impact: f64,
    pub alerts: Vec<SecurityAlert>,
    pub discrepancies: Vec<Discrepancy>,
}

/// Per-agent counts of assessed and clean reports
#[derive(Debug, Default)]
pub struct DriftStats {
    reports: DashMap<AgentId, (u64, u64)>,
}

impl DriftStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, agent_id: AgentId, clean: bool) {
        let mut entry = self.reports.entry(agent_id).or_default();
        entry.0 += 1;
        if clean {
            entry.1 += 1;
        }
    }

    /// Share of clean reports as a percentage, if any were assessed
    pub fn drift_score(&self, agent_id: &AgentId) -> Option<f64> {
        self.reports.get(agent_id).and_then(|entry| {
            let (total, clean) = *entry;
            (total > 0).then(|| clean as f64 / total as f64 * 100.0)
        })
    }
}

/// How far ahead of the server clock a report may be dated
const MAX_CLOCK_SKEW_SECS: i64 = 5 * 60;
/// Reports cover the last hour of usage; anything older is stale
const MAX_REPORT_AGE_SECS: i64 = 60 * 60;

/// Severity of using a capability with no grant at all
fn ungranted_severity(capability: Option<CapabilityType>) -> Severity {
    match capability {
        Some(CapabilityType::CodeExecution | CapabilityType::CredentialAccess) => {
            Severity::Critical
        }
        Some(
            CapabilityType::FileWrite
            | CapabilityType::DatabaseWrite
            | CapabilityType::NetworkAccess,
        ) => Severity::High,
        _ => Severity::Medium,
    }
}

/// Highest hourly limit among the grants, `None` if any grant has none
fn hourly_allowance(grants: &[&CapabilityGrant]) -> Option<u32> {
    let mut allowance = 0;
    for grant in grants {
        allowance = allowance.max(grant.spec.limits.max_per_hour?);
    }
    Some(allowance)
}

/// Compares capability reports with grants and raises alerts
pub struct DriftDetector {
    registry: Arc<dyn AgentRegistry>,
    capabilities: Arc<dyn CapabilityStore>,
    alerts: Arc<AlertStore>,
    stats: Arc<DriftStats>,
    impacts: AlertImpactTable,
    recalculation: Option<RecalculationHandle>,
}

impl DriftDetector {
    pub fn new(
        registry: Arc<dyn AgentRegistry>,
        capabilities: Arc<dyn CapabilityStore>,
        alerts: Arc<AlertStore>,
        stats: Arc<DriftStats>,
        impacts: AlertImpactTable,
    ) -> Self {
        Self {
            registry,
            capabilities,
            alerts,
            stats,
            impacts,
            recalculation: None,
        }
    }

    /// Queue a trust recalculation after every submitted report
    pub fn with_recalculation(mut self, handle: RecalculationHandle) -> Self {
        self.recalculation = Some(handle);
        self
    }

    pub fn stats(&self) -> &Arc<DriftStats> {
        &self.stats
    }

    /// Compare a report with the grants active at `now`, without storing
    /// anything. The agent-supplied `reported_at` never selects grants.
    pub async fn assess(
        &self,
        report: &CapabilityReport,
        now: DateTime<Utc>,
    ) -> Result<DriftAssessment> {
        let grants = self
            .capabilities
            .active_capabilities(&report.agent_id, now)
            .await?;

        let mut discrepancies = Vec::new();
        for reported in &report.capabilities {
            let capability = reported.capability_type.parse::<CapabilityType>().ok();
            let matching: Vec<&CapabilityGrant> = grants
                .iter()
                .filter(|grant| Some(grant.capability_type()) == capability)
                .collect();

            if matching.is_empty() {
                discrepancies.push(Discrepancy {
                    kind: DiscrepancyKind::UngrantedCapability,
                    capability_type: reported.capability_type.clone(),
                    resource: None,
                    severity: ungranted_severity(capability),
                    message: format!(
                        "capability '{}' used without an active grant",
                        reported.capability_type
                    ),
                });
                continue;
            }

            for resource in &reported.resources {
                if let Some(discrepancy) = check_resource(reported, &matching, resource) {
                    discrepancies.push(discrepancy);
                }
            }

            if let Some(allowance) = hourly_allowance(&matching) {
                if reported.usage_count > u64::from(allowance) {
                    discrepancies.push(Discrepancy {
                        kind: DiscrepancyKind::ExcessiveUsage,
                        capability_type: reported.capability_type.clone(),
                        resource: None,
                        severity: Severity::Low,
                        message: format!(
                            "{} uses of '{}' exceed the hourly limit of {}",
                            reported.usage_count, reported.capability_type, allowance
                        ),
                    });
                }
            }
        }

        let alerts: Vec<SecurityAlert> = discrepancies
            .iter()
            .map(|d| SecurityAlert {
                id: AlertId::new(),
                agent_id: report.agent_id,
                severity: d.severity,
                capability: d.capability_type.parse().ok(),
                message: d.message.clone(),
                trust_score_impact: self.impacts.impact(d.severity),
                acknowledged: false,
                created_at: now,
            })
            .collect();

        let risk_level = discrepancies
            .iter()
            .map(|d| RiskLevel::from(d.severity))
            .max()
            .unwrap_or_default();

        Ok(DriftAssessment {
            agent_id: report.agent_id,
            risk_level,
            trust_score_impact: alerts.iter().map(|a| a.trust_score_impact).sum(),
            alerts,
            discrepancies,
        })
    }

    pub async fn submit(&self, report: CapabilityReport) -> Result<DriftAssessment> {
        self.submit_at(report, Utc::now()).await
    }

    /// Verify, assess and record a report, then queue a recalculation
    pub async fn submit_at(
        &self,
        report: CapabilityReport,
        now: DateTime<Utc>,
    ) -> Result<DriftAssessment> {
        let agent = self
            .registry
            .get(&report.agent_id)
            .await?
            .ok_or(VerifyError::AgentNotFound(report.agent_id))?;

        if let Some(encoded) = &report.signature {
            let key = PublicKey::from_bytes(&agent.public_key)
                .map_err(|e| VerifyError::InvalidReport(e.to_string()))?;
            Signature::from_base64(encoded)
                .and_then(|signature| signature.verify(&report.signing_payload(), &key))
                .map_err(|e| {
                    warn!(agent_id = %agent.id, "capability report signature rejected");
                    VerifyError::InvalidReport(e.to_string())
                })?;
        }

        check_report_time(report.reported_at, now)?;

        let assessment = self.assess(&report, now).await?;
        for alert in &assessment.alerts {
            self.alerts.record(alert.clone()).await;
        }
        self.stats
            .record(agent.id, assessment.discrepancies.is_empty());

        info!(
            agent_id = %agent.id,
            risk_level = ?assessment.risk_level,
            alerts = assessment.alerts.len(),
            impact = assessment.trust_score_impact,
            "capability report assessed"
        );

        if let Some(handle) = &self.recalculation {
            if let Err(e) = handle.try_enqueue(agent.id, RecalculationReason::PostCapabilityReport)
            {
                warn!(agent_id = %agent.id, "could not queue recalculation: {}", e);
            }
        }
        Ok(assessment)
    }
}

fn check_report_time(reported_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if reported_at > now + Duration::seconds(MAX_CLOCK_SKEW_SECS) {
        return Err(VerifyError::InvalidReport(format!(
            "reported_at {reported_at} is in the future"
        )));
    }
    if reported_at < now - Duration::seconds(MAX_REPORT_AGE_SECS) {
        return Err(VerifyError::InvalidReport(format!(
            "reported_at {reported_at} is older than {MAX_REPORT_AGE_SECS} seconds"
        )));
    }
    Ok(())
}

/// Check one reported resource against the grants of its type. Trust
/// minimums are left out: drift is about what was touched.
fn check_resource(
    reported: &ReportedCapability,
    grants: &[&CapabilityGrant],
    resource: &str,
) -> Option<Discrepancy> {
    let context = ActionContext::default();
    let mut forbidden = None;
    let mut allowed = false;

    for grant in grants {
        let mut spec = grant.spec.clone();
        spec.min_trust_score = None;
        match evaluate_scope(&spec, resource, &context, None) {
            ScopeMatch::Forbidden(reason) => {
                forbidden = Some(reason);
                break;
            }
            ScopeMatch::Allowed => allowed = true,
            ScopeMatch::NotAllowed(_) => {}
        }
    }

    let (kind, severity, message) = match forbidden {
        Some(reason) => (DiscrepancyKind::ForbiddenResource, Severity::High, reason),
        None if !allowed => (
            DiscrepancyKind::OutOfScopeResource,
            Severity::Medium,
            format!(
                "resource '{resource}' is outside the scope granted for '{}'",
                reported.capability_type
            ),
        ),
        None => return None,
    };
    debug!(resource, ?kind, "drift discrepancy");

    Some(Discrepancy {
        kind,
        capability_type: reported.capability_type.clone(),
        resource: Some(resource.to_string()),
        severity,
        message,
    })
}
