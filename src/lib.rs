//! Business forecasting and what-if simulation.
//!
//! - [`forecast`]: feature engineering, model cache and the [`ForecastService`]
//! - [`ml`]: gradient-boosted trees, recurrent network, model persistence
//! - [`simulation`]: scenario projection, Monte Carlo risk analysis, sensitivity sweeps

pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod simulation;
pub mod telemetry;

pub use error::{ForesightError, Result};
pub use forecast::ForecastService;
