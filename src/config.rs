use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{ForesightError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub forecast: ForecastConfig,
    pub tree: TreeConfig,
    pub sequence: SequenceConfig,
    pub scenario: ScenarioConfig,
    pub monte_carlo: MonteCarloConfig,
    pub store: StoreConfig,
}

/// Feature layout and confidence settings shared by both model families
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub lookback: usize,
    pub rolling_window: usize,
    /// Two-sided confidence level of the forecast band (e.g. 0.95)
    pub confidence_level: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback: 7,
            rolling_window: 7,
            confidence_level: 0.95,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_leaf: 1,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub window: usize,
    pub hidden_size: usize,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub early_stopping_patience: usize,
    pub validation_split: f64,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            window: 7,
            hidden_size: 16,
            learning_rate: 0.01,
            max_epochs: 200,
            early_stopping_patience: 10,
            validation_split: 0.2,
            batch_size: 16,
            seed: 42,
        }
    }
}

/// Recommendation tier thresholds, in percent profit change
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub strong_go_pct: f64,
    pub consider_pct: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            strong_go_pct: 20.0,
            consider_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub default_iterations: usize,
    /// Spread iterations over the rayon pool
    pub parallel: bool,
    pub price_volatility: f64,
    pub cost_volatility: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            default_iterations: 1000,
            parallel: true,
            price_volatility: 0.10,
            cost_volatility: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for persisted models; models stay in memory when unset
    pub model_dir: Option<PathBuf>,
}

impl Config {
    /// Load `config/default.toml` overlaid with `FORESIGHT__*` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("FORESIGHT__").split("__"));
        figment
            .extract()
            .map_err(|e| ForesightError::serialization(path.as_ref().display().to_string(), e))
    }
}
