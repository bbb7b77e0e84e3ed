//! Deterministic what-if projection of a baseline.
//!
//! ```text
//! revenue' = revenue * (1 + price) * (1 + volume) + expansion * avg_region_revenue
//! costs'   = max(0, costs * (1 + cost) * (1 - efficiency))
//! profit'  = revenue' - costs'
//! ```

use tracing::warn;

use crate::config::ScenarioConfig;
use crate::domain::{
    percent_change, BaselineFinancials, Financials, RecommendationTier, ScenarioDeltas,
    ScenarioParameters, ScenarioResult,
};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct ScenarioEngine {
    thresholds: ScenarioConfig,
}

impl ScenarioEngine {
    pub fn new(thresholds: ScenarioConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ScenarioConfig {
        &self.thresholds
    }

    /// Project `baseline` under `params`. Pure; fails only on out-of-range deltas.
    pub fn apply(
        &self,
        baseline: &BaselineFinancials,
        params: &ScenarioParameters,
    ) -> Result<ScenarioResult> {
        let result = self.project(baseline, params)?;
        if result.deltas.profit_pct.is_none() {
            warn!(
                baseline_profit = baseline.profit,
                "baseline profit is zero, profit change undefined"
            );
        }
        Ok(result)
    }

    /// [`apply`](Self::apply) without logging, for bulk callers.
    pub(crate) fn project(
        &self,
        baseline: &BaselineFinancials,
        params: &ScenarioParameters,
    ) -> Result<ScenarioResult> {
        params.validate()?;

        let revenue = baseline.revenue
            * (1.0 + params.price_delta_pct)
            * (1.0 + params.volume_delta_pct)
            + params.expansion_region_count as f64 * baseline.avg_region_revenue;
        let costs = (baseline.costs
            * (1.0 + params.cost_delta_pct)
            * (1.0 - params.efficiency_delta_pct))
            .max(0.0);
        let projected = Financials {
            revenue,
            costs,
            profit: revenue - costs,
        };

        let base = baseline.financials();
        let profit_pct = percent_change("profit", base.profit, projected.profit).ok();

        let deltas = ScenarioDeltas {
            revenue: projected.revenue - base.revenue,
            costs: projected.costs - base.costs,
            profit: projected.profit - base.profit,
            revenue_pct: percent_change("revenue", base.revenue, projected.revenue).ok(),
            costs_pct: percent_change("costs", base.costs, projected.costs).ok(),
            profit_pct,
        };

        Ok(ScenarioResult {
            baseline: base,
            projected,
            deltas,
            recommendation_tier: self.tier(profit_pct),
            baseline_margin: base.margin(),
            projected_margin: projected.margin(),
        })
    }

    /// Tier for a profit change in percent; an undefined change is `Caution`.
    pub fn tier(&self, profit_pct: Option<f64>) -> RecommendationTier {
        match profit_pct {
            Some(pct) if pct >= self.thresholds.strong_go_pct => RecommendationTier::StrongGo,
            Some(pct) if pct >= self.thresholds.consider_pct => RecommendationTier::Consider,
            _ => RecommendationTier::Caution,
        }
    }
}
