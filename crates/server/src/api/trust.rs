//! Trust score endpoints

use agentid_trust::TrustScoreSnapshot;
use agentid_types::{AgentId, RecalculationReason, TrustFactorKind, TrustLevel};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorResponse {
    pub factor: TrustFactorKind,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustScoreResponse {
    pub trust_score: f64,
    pub last_calculated: DateTime<Utc>,
    pub factors: Vec<FactorResponse>,
    pub level: TrustLevel,
}

impl From<TrustScoreSnapshot> for TrustScoreResponse {
    fn from(snapshot: TrustScoreSnapshot) -> Self {
        Self {
            trust_score: snapshot.score,
            last_calculated: snapshot.calculated_at,
            factors: snapshot
                .factors
                .into_iter()
                .map(|f| FactorResponse {
                    factor: f.factor,
                    value: f.value,
                    weight: f.weight,
                    contribution: f.contribution,
                })
                .collect(),
            level: snapshot.level,
        }
    }
}

/// GET /agents/:agent_id/trust-score
pub async fn get_trust_score(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<TrustScoreResponse>, ApiError> {
    state.owned_agent(&caller, &agent_id).await?;

    let snapshot = state.calculator.cache().current(&agent_id).ok_or_else(|| {
        ApiError::NotFound(format!("no trust score recorded for agent {agent_id}"))
    })?;
    Ok(Json(snapshot.into()))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalculationMode {
    /// Compute before responding
    #[default]
    Sync,
    /// Hand the recalculation to the background worker
    Queued,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecalculateQuery {
    #[serde(default)]
    pub mode: RecalculationMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// POST /agents/:agent_id/trust-score/recalculate
pub async fn recalculate(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(agent_id): Path<AgentId>,
    Query(query): Query<RecalculateQuery>,
) -> Result<Response, ApiError> {
    state.owned_agent(&caller, &agent_id).await?;

    match query.mode {
        RecalculationMode::Queued => {
            state
                .recalculation
                .try_enqueue(agent_id, RecalculationReason::Manual)?;
            Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })).into_response())
        }
        RecalculationMode::Sync => {
            let snapshot = state
                .calculator
                .compute_score(&agent_id, RecalculationReason::Manual)
                .await?;
            Ok(Json(TrustScoreResponse::from(snapshot)).into_response())
        }
    }
}
