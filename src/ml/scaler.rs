use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

use crate::error::{ForesightError, Result};

/// Invertible min-max scaling onto [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self> {
        match values.iter().copied().minmax() {
            MinMaxResult::NoElements => Err(ForesightError::InsufficientHistory {
                required: 1,
                actual: 0,
            }),
            MinMaxResult::OneElement(v) => Ok(Self { min: v, max: v }),
            MinMaxResult::MinMax(min, max) => Ok(Self { min, max }),
        }
    }

    fn is_degenerate(&self) -> bool {
        (self.max - self.min).abs() < 1e-10
    }

    /// Scale a value; a constant series maps to 0.5.
    pub fn transform(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            0.5
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }

    pub fn inverse_transform(&self, scaled: f64) -> f64 {
        if self.is_degenerate() {
            self.min
        } else {
            scaled * (self.max - self.min) + self.min
        }
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.transform(*v)).collect()
    }
}
