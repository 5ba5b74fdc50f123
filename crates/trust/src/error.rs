use agentid_types::{AgentId, AlertId};
use thiserror::Error;

/// Errors that can occur during trust operations
#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Invalid trust score: {0}")]
    InvalidTrustScore(String),

    #[error("Invalid factor input: {0}")]
    InvalidFactor(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Factor source unavailable: {0}")]
    FactorUnavailable(String),

    #[error("No trust score recorded for agent {0}")]
    NoScore(AgentId),

    #[error("Security alert not found: {0}")]
    AlertNotFound(AlertId),

    #[error("Invalid feedback rating {0}, expected 1 to 5")]
    InvalidRating(u8),

    #[error("Recalculation queue is closed")]
    QueueClosed,

    #[error("Recalculation queue is full")]
    QueueFull,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<toml::de::Error> for TrustError {
    fn from(err: toml::de::Error) -> Self {
        TrustError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for TrustError {
    fn from(err: std::io::Error) -> Self {
        TrustError::InternalError(err.to_string())
    }
}
