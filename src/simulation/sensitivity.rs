use serde::{Deserialize, Serialize};

use super::ScenarioEngine;
use crate::domain::{BaselineFinancials, ScenarioParameter, ScenarioParameters};
use crate::error::{ForesightError, Result};

/// Projection at one point of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub value: f64,
    pub revenue: f64,
    pub costs: f64,
    pub profit: f64,
    pub margin: f64,
}

/// Vary one parameter over `steps` evenly spaced values in `[from, to]`,
/// holding every other parameter at zero.
pub fn sweep(
    engine: &ScenarioEngine,
    baseline: &BaselineFinancials,
    parameter: ScenarioParameter,
    from: f64,
    to: f64,
    steps: usize,
) -> Result<Vec<SensitivityPoint>> {
    if steps < 2 {
        return Err(ForesightError::out_of_range(
            "steps",
            steps as f64,
            2.0,
            f64::INFINITY,
        ));
    }

    let span = to - from;
    (0..steps)
        .map(|i| {
            let value = from + span * i as f64 / (steps - 1) as f64;
            let params = ScenarioParameters::default().with(parameter, value);
            let result = engine.apply(baseline, &params)?;
            Ok(SensitivityPoint {
                value: parameter.get(&params),
                revenue: result.projected.revenue,
                costs: result.projected.costs,
                profit: result.projected.profit,
                margin: result.projected_margin,
            })
        })
        .collect()
}
