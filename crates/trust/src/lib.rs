//! Trust scoring for the AgentID verification engine
//!
//! This crate turns eight normalized evidence factors into a composite
//! 0 to 100 trust score and keeps everything that feeds or results from it:
//! - The weighted-factor calculator and its configuration
//! - An append-only ledger of factors and score history
//! - The current-score cache read by the verification path
//! - Security alerts and their score impact
//! - Externally sourced signals (uptime, compliance, user feedback)
//! - A background worker for queued and scheduled recalculation

mod alerts;
mod calculator;
mod error;
mod ledger;
mod score;
mod signals;
mod worker;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use agentid_types::{TrustFactorKind, TrustLevel};
pub use alerts::{AlertImpactTable, AlertStore};
pub use calculator::{FactorProvider, TrustScoreCalculator};
pub use error::TrustError;
pub use ledger::{InMemoryTrustLedger, TrustLedger, TrustScoreCache};
pub use score::{determine_trust_level, FactorInputs, TrustScoreSnapshot};
pub use signals::{AgentSignals, SignalStore};
pub use worker::{RecalculationHandle, RecalculationRequest, RecalculationWorker};

/// Result type for trust operations
pub type Result<T> = std::result::Result<T, TrustError>;

/// Tolerance when checking that weights sum to one
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weight of each trust factor in the composite score.
///
/// The table is configuration: it must be non-negative and sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub verification_status: f64,
    pub uptime: f64,
    pub success_rate: f64,
    pub security_alerts: f64,
    pub compliance: f64,
    pub age: f64,
    pub drift_detection: f64,
    pub user_feedback: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            verification_status: 0.15,
            uptime: 0.10,
            success_rate: 0.15,
            security_alerts: 0.15,
            compliance: 0.10,
            age: 0.08,
            drift_detection: 0.17,
            user_feedback: 0.10,
        }
    }
}

impl FactorWeights {
    /// Weight assigned to a factor
    pub fn weight(&self, factor: TrustFactorKind) -> f64 {
        match factor {
            TrustFactorKind::VerificationStatus => self.verification_status,
            TrustFactorKind::Uptime => self.uptime,
            TrustFactorKind::SuccessRate => self.success_rate,
            TrustFactorKind::SecurityAlerts => self.security_alerts,
            TrustFactorKind::Compliance => self.compliance,
            TrustFactorKind::Age => self.age,
            TrustFactorKind::DriftDetection => self.drift_detection,
            TrustFactorKind::UserFeedback => self.user_feedback,
        }
    }

    pub fn sum(&self) -> f64 {
        TrustFactorKind::ALL.iter().map(|f| self.weight(*f)).sum()
    }

    /// Check that every weight is a finite non-negative number and that the
    /// table sums to one
    pub fn validate(&self) -> Result<()> {
        for factor in TrustFactorKind::ALL {
            let weight = self.weight(factor);
            if !weight.is_finite() || weight < 0.0 {
                return Err(TrustError::ConfigError(format!(
                    "weight for {factor} must be a non-negative number, got {weight}"
                )));
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(TrustError::ConfigError(format!(
                "factor weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Trust framework configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Factor weight table
    pub weights: FactorWeights,
    /// Trust score thresholds for different trust levels, ascending
    pub trust_level_thresholds: Vec<(TrustLevel, f64)>,
    /// Score delta applied per open security alert
    pub alert_impacts: AlertImpactTable,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            trust_level_thresholds: vec![
                (TrustLevel::Low, 20.0),
                (TrustLevel::Medium, 40.0),
                (TrustLevel::High, 60.0),
                (TrustLevel::VeryHigh, 80.0),
            ],
            alert_impacts: AlertImpactTable::default(),
        }
    }
}

impl TrustConfig {
    /// Parse and validate a TOML document. Missing sections fall back to
    /// their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: TrustConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        let mut previous = f64::NEG_INFINITY;
        for (level, threshold) in &self.trust_level_thresholds {
            if !(0.0..=100.0).contains(threshold) || *threshold < previous {
                return Err(TrustError::ConfigError(format!(
                    "threshold {threshold} for {level} must be within 0..=100 and ascending"
                )));
            }
            previous = *threshold;
        }

        self.alert_impacts.validate()
    }

    /// Classify a score using the configured thresholds
    pub fn level_for(&self, score: f64) -> TrustLevel {
        determine_trust_level(score, &self.trust_level_thresholds)
    }
}
