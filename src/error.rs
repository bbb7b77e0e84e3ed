use thiserror::Error;

use crate::domain::{ModelKind, TargetMetric};
use crate::forecast::ForecastMetricsError;

pub type Result<T> = std::result::Result<T, ForesightError>;

/// Errors raised by the forecasting and simulation engines
#[derive(Debug, Error)]
pub enum ForesightError {
    #[error("insufficient history: need at least {required} records, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("history of {actual} records is too short for a window of {window}")]
    WindowTooShort { window: usize, actual: usize },

    #[error("invalid history at record {index}: {reason}")]
    InvalidHistory { index: usize, reason: String },

    #[error("no trained {kind} model for target {target}")]
    NotTrained { kind: ModelKind, target: TargetMetric },

    #[error("training already in progress for {kind}/{target}")]
    TrainingInProgress { kind: ModelKind, target: TargetMetric },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    InvalidParameterRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("training diverged at epoch {epoch}: {detail}")]
    DivergentTraining { epoch: usize, detail: String },

    #[error("percentage change of {field} is undefined for a zero baseline")]
    DivisionUndefined { field: &'static str },

    #[error("serialization failed for {key}: {detail}")]
    SerializationError { key: String, detail: String },

    #[error("model error: {0}")]
    Model(String),

    #[error("metrics: {0}")]
    Metrics(#[from] ForecastMetricsError),

    #[error("model store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ForesightError {
    pub(crate) fn out_of_range(field: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        Self::InvalidParameterRange {
            field: field.into(),
            value,
            min,
            max,
        }
    }

    pub(crate) fn serialization(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::SerializationError {
            key: key.into(),
            detail: err.to_string(),
        }
    }
}

/// Check that `value` is finite and within `[min, max]`.
pub(crate) fn ensure_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ForesightError::out_of_range(field, value, min, max))
    }
}
