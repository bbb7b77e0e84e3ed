use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::{Normal, Triangular};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::domain::ScenarioParameter;
use crate::error::{ForesightError, Result};

/// Shape of the noise drawn around a parameter's center value
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DistributionKind {
    #[default]
    Normal,
    /// Flat over `mean ± sqrt(3)·std`
    Uniform,
    /// Symmetric triangle over `mean ± sqrt(6)·std`, peaked at the mean
    Triangular,
}

/// Spread of one parameter. A zero `std` pins the parameter to its center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDistribution {
    pub std: f64,
    #[serde(default)]
    pub kind: DistributionKind,
}

impl ParameterDistribution {
    pub fn fixed() -> Self {
        Self::default()
    }

    pub fn normal(std: f64) -> Self {
        Self {
            std,
            kind: DistributionKind::Normal,
        }
    }

    pub fn uniform(std: f64) -> Self {
        Self {
            std,
            kind: DistributionKind::Uniform,
        }
    }

    pub fn triangular(std: f64) -> Self {
        Self {
            std,
            kind: DistributionKind::Triangular,
        }
    }

    /// Largest std whose widest support (triangular, `2·sqrt(6)·std`) stays finite
    pub fn max_std() -> f64 {
        f64::MAX / (2.0 * 6f64.sqrt())
    }

    pub fn validate(&self, field: &str) -> Result<()> {
        let max = Self::max_std();
        if !self.std.is_finite() || self.std < 0.0 || self.std > max {
            return Err(ForesightError::out_of_range(
                format!("{field}.std"),
                self.std,
                0.0,
                max,
            ));
        }
        Ok(())
    }

    /// Draw a value around `mean`, clipped to `bounds`. Draws nothing from
    /// `rng` when `std` is zero.
    pub fn sample<R: Rng + ?Sized>(&self, mean: f64, bounds: (f64, f64), rng: &mut R) -> Result<f64> {
        let (min, max) = bounds;
        if self.std == 0.0 {
            return Ok(mean.clamp(min, max));
        }

        let value = match self.kind {
            DistributionKind::Normal => Normal::new(mean, self.std)
                .map_err(|e| ForesightError::Model(format!("normal distribution: {e}")))?
                .sample(rng),
            DistributionKind::Uniform => {
                let half = 3f64.sqrt() * self.std;
                let (low, high) = (mean - half, mean + half);
                if !(high - low).is_finite() {
                    return Err(ForesightError::Model(format!(
                        "uniform distribution: span of std {} overflows",
                        self.std
                    )));
                }
                Uniform::new_inclusive(low, high).sample(rng)
            }
            DistributionKind::Triangular => {
                let half = 6f64.sqrt() * self.std;
                Triangular::new(mean - half, mean + half, mean)
                    .map_err(|e| ForesightError::Model(format!("triangular distribution: {e}")))?
                    .sample(rng)
            }
        };

        Ok(value.clamp(min, max))
    }
}

/// Per-parameter spreads for a Monte Carlo run. Unlisted parameters stay fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionSpec {
    pub price: ParameterDistribution,
    pub cost: ParameterDistribution,
    pub volume: ParameterDistribution,
    pub efficiency: ParameterDistribution,
    pub expansion: ParameterDistribution,
}

impl DistributionSpec {
    /// Normal noise on price and cost only
    pub fn from_volatility(price_std: f64, cost_std: f64) -> Self {
        Self {
            price: ParameterDistribution::normal(price_std),
            cost: ParameterDistribution::normal(cost_std),
            ..Self::default()
        }
    }

    pub fn get(&self, parameter: ScenarioParameter) -> &ParameterDistribution {
        match parameter {
            ScenarioParameter::Price => &self.price,
            ScenarioParameter::Cost => &self.cost,
            ScenarioParameter::Volume => &self.volume,
            ScenarioParameter::Efficiency => &self.efficiency,
            ScenarioParameter::Expansion => &self.expansion,
        }
    }

    pub fn with(mut self, parameter: ScenarioParameter, distribution: ParameterDistribution) -> Self {
        let slot = match parameter {
            ScenarioParameter::Price => &mut self.price,
            ScenarioParameter::Cost => &mut self.cost,
            ScenarioParameter::Volume => &mut self.volume,
            ScenarioParameter::Efficiency => &mut self.efficiency,
            ScenarioParameter::Expansion => &mut self.expansion,
        };
        *slot = distribution;
        self
    }

    pub fn validate(&self) -> Result<()> {
        use strum::IntoEnumIterator;
        for parameter in ScenarioParameter::iter() {
            self.get(parameter).validate(parameter.field_name())?;
        }
        Ok(())
    }

    /// True when every parameter is pinned
    pub fn is_degenerate(&self) -> bool {
        use strum::IntoEnumIterator;
        ScenarioParameter::iter().all(|p| self.get(p).std == 0.0)
    }
}
