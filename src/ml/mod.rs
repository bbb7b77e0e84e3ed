//! Machine Learning Module
//!
//! Two model families share one contract:
//! - Gradient-boosted regression trees over engineered features
//! - A recurrent network over min-max normalized raw values
//!
//! Both train into an immutable [`ModelHandle`] and forecast recursively,
//! feeding each one-step prediction back into the working series.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ForecastResult, ModelKind, TargetMetric, TimeSeriesRecord};
use crate::error::{ForesightError, Result};
use crate::forecast::{ConfidenceBand, ForecastMetrics};

pub mod gradient_boosting;
pub mod recurrent;
pub mod scaler;
pub mod store;
pub mod training;

pub use gradient_boosting::*;
pub use recurrent::*;
pub use scaler::*;
pub use store::*;
pub use training::*;

/// Model family capability: train into a handle, forecast from a handle.
pub trait Forecaster: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn train(&self, records: &[TimeSeriesRecord], target: TargetMetric) -> Result<ModelHandle>;

    fn predict(
        &self,
        handle: &ModelHandle,
        history: &[TimeSeriesRecord],
        horizon: usize,
    ) -> Result<ForecastResult>;
}

/// Descriptive data recorded when a model is trained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_kind: ModelKind,
    pub target_metric: TargetMetric,
    pub trained_at: DateTime<Utc>,
    pub feature_schema_version: u32,
    /// In-sample residual standard deviation, in original units
    pub residual_std: f64,
    pub training_samples: usize,
    pub history_fingerprint: u64,
    pub metrics: Option<ForecastMetrics>,
}

/// Trained state of either model family
#[derive(Debug, Serialize, Deserialize)]
pub enum ModelState {
    Tree(GradientBoostedModel),
    Sequence(RecurrentModel),
}

/// Immutable trained model. Retraining produces a new handle.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelHandle {
    metadata: ModelMetadata,
    state: ModelState,
}

impl ModelHandle {
    pub fn new(metadata: ModelMetadata, state: ModelState) -> Self {
        Self { metadata, state }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn kind(&self) -> ModelKind {
        self.metadata.model_kind
    }

    pub fn target(&self) -> TargetMetric {
        self.metadata.target_metric
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ForesightError::serialization(self.blob_key(), e))
    }

    pub fn from_bytes(key: &str, bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| ForesightError::serialization(key, e))
    }

    /// Store key, `"{kind}-{target}"`
    pub fn blob_key(&self) -> String {
        format!("{}-{}", self.metadata.model_kind, self.metadata.target_metric)
    }

    pub(crate) fn not_trained(&self, expected: ModelKind) -> ForesightError {
        ForesightError::NotTrained {
            kind: expected,
            target: self.metadata.target_metric,
        }
    }
}

/// Recursive one-step-ahead forecast. `step` receives the working series
/// (history followed by earlier predictions) and the date being predicted.
pub(crate) fn recursive_forecast<F>(
    history: &[f64],
    last_date: NaiveDate,
    horizon: usize,
    mut step: F,
) -> Result<(Vec<NaiveDate>, Vec<f64>)>
where
    F: FnMut(&[f64], NaiveDate) -> Result<f64>,
{
    let mut working = Vec::with_capacity(history.len() + horizon);
    working.extend_from_slice(history);

    let mut dates = Vec::with_capacity(horizon);
    let mut points = Vec::with_capacity(horizon);
    let mut date = last_date;

    for _ in 0..horizon {
        date += Duration::days(1);
        let next = step(&working, date)?;
        if !next.is_finite() {
            return Err(ForesightError::Model(format!(
                "non-finite prediction for {date}"
            )));
        }
        working.push(next);
        dates.push(date);
        points.push(next);
    }

    Ok((dates, points))
}

/// Attach the confidence band and wrap into a result.
pub(crate) fn assemble_forecast(
    handle: &ModelHandle,
    band: &ConfidenceBand,
    dates: Vec<NaiveDate>,
    points: Vec<f64>,
) -> ForecastResult {
    let (lower_bound, upper_bound) = band.bounds(&points, handle.metadata.residual_std);
    ForecastResult {
        horizon: points.len(),
        dates,
        point_values: points,
        lower_bound,
        upper_bound,
        model_kind: handle.metadata.model_kind,
        target_metric: handle.metadata.target_metric,
    }
}

pub(crate) fn ensure_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        return Err(ForesightError::out_of_range("horizon", 0.0, 1.0, f64::INFINITY));
    }
    Ok(())
}

pub(crate) fn last_date(history: &[TimeSeriesRecord], required: usize) -> Result<NaiveDate> {
    history
        .last()
        .map(|r| r.date)
        .ok_or(ForesightError::InsufficientHistory {
            required,
            actual: 0,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursive_forecast_feeds_predictions_back() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        // naive "last value + 1" model
        let (dates, points) =
            recursive_forecast(&[1.0, 2.0, 3.0], start, 4, |working, _| Ok(working[working.len() - 1] + 1.0))
                .unwrap();

        assert_eq!(points, vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_recursive_forecast_sees_growing_series() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut lengths = Vec::new();
        recursive_forecast(&[0.0; 5], start, 3, |working, _| {
            lengths.push(working.len());
            Ok(0.0)
        })
        .unwrap();
        assert_eq!(lengths, vec![5, 6, 7]);
    }

    #[test]
    fn test_recursive_forecast_rejects_nan() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let result = recursive_forecast(&[1.0], start, 2, |_, _| Ok(f64::NAN));
        assert!(matches!(result, Err(ForesightError::Model(_))));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        assert!(matches!(
            ensure_horizon(0),
            Err(ForesightError::InvalidParameterRange { .. })
        ));
        assert!(ensure_horizon(1).is_ok());
    }
}
