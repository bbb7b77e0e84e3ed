//! Monte Carlo risk analysis over scenario parameters.
//!
//! Every iteration owns a generator seeded from `(seed, iteration)`, so a run
//! is reproducible and the result does not depend on whether iterations are
//! executed sequentially or on the rayon pool.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{DistributionSpec, ScenarioEngine};
use crate::config::MonteCarloConfig;
use crate::domain::{BaselineFinancials, ScenarioParameter, ScenarioParameters};
use crate::error::{ensure_range, Result};

pub const MIN_ITERATIONS: usize = 100;
pub const MAX_ITERATIONS: usize = 5000;

/// Projected revenue and profit of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub iteration: usize,
    pub revenue: f64,
    pub profit: f64,
    pub parameters: ScenarioParameters,
}

/// Distribution of projected profit over all iterations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub iterations: usize,
    pub seed: u64,
    pub mean_profit: f64,
    pub std_profit: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    pub probability_profitable: f64,
    pub mean_revenue: f64,
    pub std_revenue: f64,
    /// 5th percentile profit minus baseline profit
    pub value_at_risk_5pct: f64,
}

/// Streaming mean and population variance (Welford)
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn std(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0).sqrt()
        }
    }
}

/// Linear-interpolated percentile of sorted data, `q` in [0, 1].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Independent sub-seed for one iteration (SplitMix64 finalizer).
fn iteration_seed(seed: u64, iteration: u64) -> u64 {
    let mut z = seed.wrapping_add(iteration.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[derive(Debug, Clone)]
pub struct MonteCarloEngine {
    scenario: ScenarioEngine,
    parallel: bool,
}

impl MonteCarloEngine {
    pub fn new(scenario: ScenarioEngine) -> Self {
        Self {
            scenario,
            parallel: cfg!(feature = "parallel"),
        }
    }

    pub fn from_config(scenario: ScenarioEngine, config: &MonteCarloConfig) -> Self {
        Self::new(scenario).with_parallel(config.parallel)
    }

    /// Run iterations on the rayon pool. Ignored without the `parallel` feature.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel && cfg!(feature = "parallel");
        self
    }

    /// Sample and project every iteration, in iteration order.
    #[instrument(skip(self, baseline, center, spec))]
    pub fn simulate(
        &self,
        baseline: &BaselineFinancials,
        center: &ScenarioParameters,
        spec: &DistributionSpec,
        iterations: usize,
        seed: u64,
    ) -> Result<Vec<SimulationOutcome>> {
        ensure_range(
            "iteration_count",
            iterations as f64,
            MIN_ITERATIONS as f64,
            MAX_ITERATIONS as f64,
        )?;
        center.validate()?;
        spec.validate()?;

        let run = |i: usize| self.iteration(baseline, center, spec, seed, i);
        debug!(iterations, parallel = self.parallel, "sampling scenarios");

        #[cfg(feature = "parallel")]
        if self.parallel {
            return (0..iterations).into_par_iter().map(run).collect();
        }

        (0..iterations).map(run).collect()
    }

    /// Run the simulation and summarize projected profit.
    pub fn run(
        &self,
        baseline: &BaselineFinancials,
        center: &ScenarioParameters,
        spec: &DistributionSpec,
        iterations: usize,
        seed: u64,
    ) -> Result<MonteCarloSummary> {
        let outcomes = self.simulate(baseline, center, spec, iterations, seed)?;
        let summary = summarize(&outcomes, baseline, seed);
        info!(
            iterations,
            mean_profit = summary.mean_profit,
            p5 = summary.p5,
            probability_profitable = summary.probability_profitable,
            "monte carlo complete"
        );
        Ok(summary)
    }

    fn iteration(
        &self,
        baseline: &BaselineFinancials,
        center: &ScenarioParameters,
        spec: &DistributionSpec,
        seed: u64,
        iteration: usize,
    ) -> Result<SimulationOutcome> {
        let mut rng = StdRng::seed_from_u64(iteration_seed(seed, iteration as u64));
        let mut params = *center;

        for parameter in ScenarioParameter::iter() {
            let value =
                spec.get(parameter)
                    .sample(parameter.get(center), parameter.bounds(), &mut rng)?;
            parameter.set(&mut params, value);
        }

        let result = self.scenario.project(baseline, &params)?;
        Ok(SimulationOutcome {
            iteration,
            revenue: result.projected.revenue,
            profit: result.projected.profit,
            parameters: params,
        })
    }
}

/// Aggregate statistics of a set of outcomes.
pub fn summarize(
    outcomes: &[SimulationOutcome],
    baseline: &BaselineFinancials,
    seed: u64,
) -> MonteCarloSummary {
    let mut profit_stats = RunningStats::default();
    let mut revenue_stats = RunningStats::default();
    let mut profitable = 0usize;

    for outcome in outcomes {
        profit_stats.push(outcome.profit);
        revenue_stats.push(outcome.revenue);
        if outcome.profit > 0.0 {
            profitable += 1;
        }
    }

    let mut sorted: Vec<f64> = outcomes.iter().map(|o| o.profit).collect();
    sorted.sort_by(f64::total_cmp);

    let p5 = percentile(&sorted, 0.05);
    let probability_profitable = if outcomes.is_empty() {
        0.0
    } else {
        profitable as f64 / outcomes.len() as f64
    };

    MonteCarloSummary {
        iterations: outcomes.len(),
        seed,
        mean_profit: profit_stats.mean(),
        std_profit: profit_stats.std(),
        p5,
        p50: percentile(&sorted, 0.50),
        p95: percentile(&sorted, 0.95),
        probability_profitable,
        mean_revenue: revenue_stats.mean(),
        std_revenue: revenue_stats.std(),
        value_at_risk_5pct: p5 - baseline.profit,
    }
}
