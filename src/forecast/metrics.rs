//! Forecast Metrics and Evaluation
//!
//! Accuracy metrics for fitted models (MAE, RMSE, MAPE, R²) and the
//! confidence band applied to recursive multi-step forecasts.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Actual values closer to zero than this are left out of MAPE
const MAPE_FLOOR: f64 = 1e-6;

/// In-sample fit of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent, over the actual values that are not ~0
    pub mape: f64,
    pub r2: f64,
    pub sample_count: usize,
    /// Largest absolute error
    pub max_error: f64,
    /// Smallest absolute error
    pub min_error: f64,
    /// Population std of the signed errors
    pub std_dev: f64,
}

impl ForecastMetrics {
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastMetricsError> {
        if actual.len() != predicted.len() {
            return Err(ForecastMetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        if actual.is_empty() {
            return Err(ForecastMetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

        let mut abs_sum = 0.0;
        let mut sse = 0.0;
        let mut max_error = 0.0f64;
        let mut min_error = f64::INFINITY;
        for e in errors.iter().map(|e| e.abs()) {
            abs_sum += e;
            sse += e * e;
            max_error = max_error.max(e);
            min_error = min_error.min(e);
        }

        let (pct_sum, pct_count) = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| a.abs() > MAPE_FLOOR)
            .fold((0.0, 0usize), |(sum, count), (a, e)| {
                (sum + e.abs() / a.abs() * 100.0, count + 1)
            });
        let mape = if pct_count == 0 { 0.0 } else { pct_sum / pct_count as f64 };

        let mean = actual.iter().sum::<f64>() / n;
        let sst: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        // A flat series is explained perfectly only by a perfect fit
        let r2 = match (sst > 1e-12, sse < 1e-12) {
            (true, _) => 1.0 - sse / sst,
            (false, true) => 1.0,
            (false, false) => 0.0,
        };

        Ok(Self {
            mae: abs_sum / n,
            rmse: (sse / n).sqrt(),
            mape,
            r2,
            sample_count: actual.len(),
            max_error,
            min_error,
            std_dev: population_std(&errors),
        })
    }

    pub fn quality(&self) -> ForecastQuality {
        ForecastQuality::from_mape(self.mape)
    }
}

/// Fit class by MAPE band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ForecastQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl ForecastQuality {
    /// Upper MAPE bound (exclusive, percent) of each class but the last
    const BANDS: [(f64, ForecastQuality); 4] = [
        (5.0, ForecastQuality::Excellent),
        (10.0, ForecastQuality::Good),
        (20.0, ForecastQuality::Fair),
        (50.0, ForecastQuality::Poor),
    ];

    pub fn from_mape(mape: f64) -> Self {
        Self::BANDS
            .iter()
            .find(|(bound, _)| mape < *bound)
            .map_or(ForecastQuality::VeryPoor, |(_, quality)| *quality)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("cannot score {predicted} predictions against {actual} actual values")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("no values to score")]
    EmptyData,
}

/// Population standard deviation (n denominator)
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Band around a recursive forecast. Recursive error accumulates, so the
/// half-width at step `t` (1-indexed) is `z * residual_std * sqrt(t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBand {
    z_score: f64,
}

impl ConfidenceBand {
    /// Band for a two-sided confidence level (e.g. 0.95)
    pub fn new(confidence: f64) -> Self {
        // Normal quantiles for the usual levels
        let z_score = match confidence {
            c if c >= 0.99 => 2.576,
            c if c >= 0.95 => 1.96,
            c if c >= 0.90 => 1.645,
            c if c >= 0.80 => 1.282,
            _ => 1.0,
        };
        Self { z_score }
    }

    pub fn with_z_score(z_score: f64) -> Self {
        Self {
            z_score: z_score.abs(),
        }
    }

    pub fn z_score(&self) -> f64 {
        self.z_score
    }

    /// Half-width at 1-indexed `step`
    pub fn margin(&self, residual_std: f64, step: usize) -> f64 {
        let std = if residual_std.is_finite() { residual_std.abs() } else { 0.0 };
        self.z_score * std * (step as f64).sqrt()
    }

    /// Lower and upper bounds for a whole forecast path
    pub fn bounds(&self, points: &[f64], residual_std: f64) -> (Vec<f64>, Vec<f64>) {
        points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let margin = self.margin(residual_std, i + 1);
                (point - margin, point + margin)
            })
            .unzip()
    }
}
