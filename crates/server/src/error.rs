//! API error envelope

use agentid_core::CoreError;
use agentid_trust::TrustError;
use agentid_verify::VerifyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by API handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    /// Detail is logged, never sent to the caller
    #[error("{0} unavailable")]
    Unavailable(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "already_finalized",
            Self::BadRequest(_) => "bad_request",
            Self::Validation(_) => "validation_failed",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (self.status(), Json(envelope)).into_response()
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::AgentNotFound(id) => ApiError::NotFound(format!("agent {id} not found")),
            VerifyError::RecordNotFound(id) => {
                ApiError::NotFound(format!("verification record {id} not found"))
            }
            VerifyError::AlreadyFinalized(id) => {
                ApiError::Conflict(format!("verification record {id} already finalized"))
            }
            VerifyError::InvalidReport(detail) => {
                ApiError::BadRequest(format!("invalid capability report: {detail}"))
            }
            VerifyError::Core(err) => err.into(),
            VerifyError::Trust(err) => err.into(),
            other => {
                tracing::error!(error = %other, "verification dependency failed");
                ApiError::Unavailable("verification")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AgentNotFound(id) => ApiError::NotFound(format!("agent {id} not found")),
            CoreError::GrantNotFound(id) => {
                ApiError::NotFound(format!("capability grant {id} not found"))
            }
            CoreError::InvalidCapability(detail)
            | CoreError::InvalidAgent(detail)
            | CoreError::InvalidPublicKey(detail) => ApiError::Validation(detail),
            CoreError::Unavailable(detail) => {
                tracing::error!(error = %detail, "registry dependency failed");
                ApiError::Unavailable("registry")
            }
        }
    }
}

impl From<TrustError> for ApiError {
    fn from(err: TrustError) -> Self {
        match err {
            TrustError::NoScore(id) => {
                ApiError::NotFound(format!("no trust score recorded for agent {id}"))
            }
            TrustError::AlertNotFound(id) => {
                ApiError::NotFound(format!("security alert {id} not found"))
            }
            TrustError::InvalidRating(_) | TrustError::InvalidFactor(_) => {
                ApiError::Validation(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "trust dependency failed");
                ApiError::Unavailable("trust scoring")
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}
