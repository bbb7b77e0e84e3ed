//! # Scenario Simulation Module
//!
//! What-if analysis on top of a baseline financial snapshot.
//!
//! ## Components
//!
//! - **Scenario**: Deterministic projection of revenue, costs and profit under parameter deltas
//! - **Distribution**: Per-parameter noise models (normal, uniform, triangular)
//! - **Monte Carlo**: Seeded, reproducible sampling of scenarios with profit percentiles and VaR
//! - **Sensitivity**: One-parameter sweeps
//!
//! ## Usage
//!
//! ```rust
//! use business_foresight::domain::{BaselineFinancials, ScenarioParameters};
//! use business_foresight::simulation::{DistributionSpec, MonteCarloEngine, ScenarioEngine};
//!
//! let baseline = BaselineFinancials::new(100_000.0, 70_000.0);
//! let params = ScenarioParameters {
//!     price_delta_pct: 0.10,
//!     ..Default::default()
//! };
//!
//! let result = ScenarioEngine::default().apply(&baseline, &params).unwrap();
//! assert!((result.projected.profit - 40_000.0).abs() < 1e-6);
//!
//! let summary = MonteCarloEngine::new(ScenarioEngine::default())
//!     .run(&baseline, &params, &DistributionSpec::from_volatility(0.10, 0.05), 1000, 42)
//!     .unwrap();
//! assert!(summary.p5 <= summary.p95);
//! ```

pub mod distribution;
pub mod monte_carlo;
pub mod scenario;
pub mod sensitivity;

pub use distribution::{DistributionKind, DistributionSpec, ParameterDistribution};
pub use monte_carlo::{
    percentile, summarize, MonteCarloEngine, MonteCarloSummary, SimulationOutcome,
    MAX_ITERATIONS, MIN_ITERATIONS,
};
pub use scenario::ScenarioEngine;
pub use sensitivity::{sweep, SensitivityPoint};
