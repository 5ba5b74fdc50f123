//! Capability grant and drift report endpoints

use agentid_core::CapabilityStore;
use agentid_types::{AgentId, CapabilityGrant, CapabilitySpec, GrantId, RiskLevel, SecurityAlert};
use agentid_verify::{CapabilityReport, Discrepancy, DriftAssessment, ReportedCapability};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::ValidatedJson;
use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /agents/:agent_id/capabilities
///
/// Lists every grant, revoked ones included.
pub async fn list_capabilities(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<Vec<CapabilityGrant>>, ApiError> {
    state.owned_agent(&caller, &agent_id).await?;
    Ok(Json(state.capabilities.list_capabilities(&agent_id).await?))
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct GrantCapabilityRequest {
    #[serde(flatten)]
    pub spec: CapabilitySpec,
}

/// POST /agents/:agent_id/capabilities
pub async fn grant_capability(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(agent_id): Path<AgentId>,
    ValidatedJson(body): ValidatedJson<GrantCapabilityRequest>,
) -> Result<(StatusCode, Json<CapabilityGrant>), ApiError> {
    state.owned_agent(&caller, &agent_id).await?;

    let grant = state
        .capabilities
        .grant_capability(&agent_id, body.spec)
        .await?;
    info!(
        caller = %caller.name,
        agent_id = %agent_id,
        grant_id = %grant.id,
        "capability granted via API"
    );
    Ok((StatusCode::CREATED, Json(grant)))
}

/// DELETE /agents/:agent_id/capabilities/:grant_id
pub async fn revoke_capability(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((agent_id, grant_id)): Path<(AgentId, GrantId)>,
) -> Result<Json<CapabilityGrant>, ApiError> {
    state.owned_agent(&caller, &agent_id).await?;

    let grant = state
        .capabilities
        .revoke_capability(&agent_id, &grant_id)
        .await?;
    info!(
        caller = %caller.name,
        agent_id = %agent_id,
        grant_id = %grant_id,
        "capability revoked via API"
    );
    Ok(Json(grant))
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// Defaults to the time the report is received
    #[serde(default, alias = "reported_at")]
    pub reported_at: Option<DateTime<Utc>>,
    #[validate(length(max = 256))]
    pub capabilities: Vec<ReportedCapability>,
    /// Base64 Ed25519 signature by the agent's key
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub risk_level: RiskLevel,
    pub trust_score_impact: f64,
    pub alerts: Vec<SecurityAlert>,
    pub discrepancies: Vec<Discrepancy>,
}

impl From<DriftAssessment> for ReportResponse {
    fn from(assessment: DriftAssessment) -> Self {
        Self {
            risk_level: assessment.risk_level,
            trust_score_impact: assessment.trust_score_impact,
            alerts: assessment.alerts,
            discrepancies: assessment.discrepancies,
        }
    }
}

/// POST /agents/:agent_id/capabilities/report
pub async fn report_capabilities(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(agent_id): Path<AgentId>,
    ValidatedJson(body): ValidatedJson<ReportRequest>,
) -> Result<Json<ReportResponse>, ApiError> {
    state.owned_agent(&caller, &agent_id).await?;

    let report = CapabilityReport {
        agent_id,
        reported_at: body.reported_at.unwrap_or_else(Utc::now),
        capabilities: body.capabilities,
        signature: body.signature,
    };
    let assessment = state.drift.submit(report).await?;
    Ok(Json(assessment.into()))
}
