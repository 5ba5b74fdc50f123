//! Verification and action-result endpoints

use agentid_types::{
    ActionContext, ActionRequest, ActionStatus, AgentId, AuditId, VerificationRecord,
};
use agentid_verify::VerificationDecision;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ValidatedJson;
use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct VerifyActionRequest {
    #[serde(alias = "actionType")]
    #[validate(length(min = 1, max = 64))]
    pub action_type: String,
    #[validate(length(min = 1, max = 4096))]
    pub resource: String,
    #[serde(default)]
    pub context: ActionContext,
}

/// POST /agents/:agent_id/verify-action
///
/// Denials are 200 responses with `allowed: false`. Ownership is checked
/// inside the engine's bounded registry lookup, so a slow registry turns
/// into a denial rather than a stalled request.
pub async fn verify_action(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(agent_id): Path<AgentId>,
    ValidatedJson(body): ValidatedJson<VerifyActionRequest>,
) -> Result<Json<VerificationDecision>, ApiError> {
    let request =
        ActionRequest::new(agent_id, body.action_type, body.resource).with_context(body.context);
    let decision = state
        .engine
        .verify_action_for(&caller.organization_id, &request)
        .await?;
    Ok(Json(decision))
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct LogActionRequest {
    pub status: ActionStatus,
    #[serde(default)]
    pub result: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogActionResponse {
    pub audit_id: AuditId,
    pub status: ActionStatus,
    pub completed_at: DateTime<Utc>,
}

/// POST /agents/:agent_id/log-action/:audit_id
pub async fn log_action(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((agent_id, audit_id)): Path<(AgentId, AuditId)>,
    ValidatedJson(body): ValidatedJson<LogActionRequest>,
) -> Result<Json<LogActionResponse>, ApiError> {
    state.owned_agent(&caller, &agent_id).await?;

    let record = state
        .recorder
        .log_action_result(&audit_id, Some(&agent_id), body.status, body.result)
        .await?;
    Ok(Json(LogActionResponse {
        audit_id: record.audit_id,
        status: body.status,
        completed_at: record.completed_at.unwrap_or_else(Utc::now),
    }))
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UnconfirmedQuery {
    /// Overrides the configured age threshold
    pub older_than_secs: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnconfirmedResponse {
    pub records: Vec<VerificationRecord>,
}

/// GET /agents/:agent_id/verifications/unconfirmed
pub async fn unconfirmed(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(agent_id): Path<AgentId>,
    Query(query): Query<UnconfirmedQuery>,
) -> Result<Json<UnconfirmedResponse>, ApiError> {
    state.owned_agent(&caller, &agent_id).await?;

    let older_than = match query.older_than_secs {
        Some(secs) => Duration::try_seconds(secs)
            .filter(|d| *d >= Duration::zero())
            .ok_or_else(|| {
                ApiError::Validation("older_than_secs must be a non-negative number".into())
            })?,
        None => state.engine.config().unconfirmed_after,
    };

    let records = state
        .recorder
        .unconfirmed(older_than, Utc::now())
        .await?
        .into_iter()
        .filter(|record| record.agent_id == agent_id)
        .collect();
    Ok(Json(UnconfirmedResponse { records }))
}
