use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::TargetMetric;

/// Forecasting model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelKind {
    /// Gradient-boosted regression trees over engineered features
    Tree,
    /// Recurrent network over normalized raw values
    Sequence,
}

/// Multi-step forecast with a confidence band per step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub horizon: usize,
    pub dates: Vec<NaiveDate>,
    pub point_values: Vec<f64>,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
    pub model_kind: ModelKind,
    pub target_metric: TargetMetric,
}

impl ForecastResult {
    /// Width of the confidence band at step `index` (0-based)
    pub fn band_width(&self, index: usize) -> Option<f64> {
        Some(self.upper_bound.get(index)? - self.lower_bound.get(index)?)
    }

    /// Sum of the point forecasts over the horizon
    pub fn total(&self) -> f64 {
        self.point_values.iter().sum()
    }
}
