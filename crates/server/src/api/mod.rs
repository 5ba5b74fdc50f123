//! HTTP API for the verification engine

pub mod capabilities;
pub mod health;
pub mod trust;
pub mod verify;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::auth::require_auth;
use crate::error::ApiError;
use crate::state::AppState;

pub use capabilities::{ReportRequest, ReportResponse};
pub use health::HealthResponse;
pub use trust::{FactorResponse, RecalculateQuery, RecalculationMode, TrustScoreResponse};
pub use verify::{
    LogActionRequest, LogActionResponse, UnconfirmedQuery, UnconfirmedResponse,
    VerifyActionRequest,
};

/// JSON body that is validated before it reaches the handler
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    // Public routes
    let public_routes = Router::new().route("/health", get(health::health));

    // Agent routes, all scoped to the caller's organization
    let agent_routes = Router::new()
        .route("/agents/:agent_id/verify-action", post(verify::verify_action))
        .route(
            "/agents/:agent_id/log-action/:audit_id",
            post(verify::log_action),
        )
        .route(
            "/agents/:agent_id/verifications/unconfirmed",
            get(verify::unconfirmed),
        )
        .route("/agents/:agent_id/trust-score", get(trust::get_trust_score))
        .route(
            "/agents/:agent_id/trust-score/recalculate",
            post(trust::recalculate),
        )
        .route(
            "/agents/:agent_id/capabilities",
            get(capabilities::list_capabilities).post(capabilities::grant_capability),
        )
        .route(
            "/agents/:agent_id/capabilities/report",
            post(capabilities::report_capabilities),
        )
        .route(
            "/agents/:agent_id/capabilities/:grant_id",
            delete(capabilities::revoke_capability),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(public_routes)
        .merge(agent_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
