use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::TimeSeriesRecord;
use crate::error::{ensure_range, ForesightError, Result};

/// Lower bound of every percentage delta (a full -100% change)
pub const DELTA_MIN: f64 = -1.0;
/// Upper bound of every percentage delta (+500%)
pub const DELTA_MAX: f64 = 5.0;

// ============================================================================
// Baseline
// ============================================================================

/// Revenue, costs and profit of a period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub revenue: f64,
    pub costs: f64,
    pub profit: f64,
}

impl Financials {
    /// Profit as a fraction of revenue, 0 when there is no revenue
    pub fn margin(&self) -> f64 {
        if self.revenue > 0.0 {
            self.profit / self.revenue
        } else {
            0.0
        }
    }
}

/// Aggregate financial snapshot scenarios are projected from.
///
/// `profit` is always `revenue - costs` so that a zero-delta projection
/// reproduces the baseline exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineFinancials {
    pub revenue: f64,
    pub costs: f64,
    pub profit: f64,
    /// Revenue estimate for one additional region
    pub avg_region_revenue: f64,
}

impl BaselineFinancials {
    /// Single-region baseline; a new region is expected to earn the whole baseline revenue.
    pub fn new(revenue: f64, costs: f64) -> Self {
        Self {
            revenue,
            costs,
            profit: revenue - costs,
            avg_region_revenue: revenue,
        }
    }

    pub fn with_avg_region_revenue(mut self, avg_region_revenue: f64) -> Self {
        self.avg_region_revenue = avg_region_revenue;
        self
    }

    /// Sum a history into a baseline. The per-region estimate is total revenue
    /// divided by the number of distinct regions. The records' own profit
    /// column is ignored in favour of `revenue - costs`.
    pub fn from_records(records: &[TimeSeriesRecord]) -> Self {
        let revenue: f64 = records.iter().map(|r| r.revenue).sum();
        let costs: f64 = records.iter().map(|r| r.costs).sum();
        let regions = records.iter().map(|r| r.region.as_str()).unique().count();

        let avg_region_revenue = if regions == 0 {
            0.0
        } else {
            revenue / regions as f64
        };

        Self {
            revenue,
            costs,
            profit: revenue - costs,
            avg_region_revenue,
        }
    }

    pub fn financials(&self) -> Financials {
        Financials {
            revenue: self.revenue,
            costs: self.costs,
            profit: self.profit,
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Hypothetical business change, deltas expressed as fractions (0.10 = +10%)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParameters {
    pub price_delta_pct: f64,
    pub cost_delta_pct: f64,
    pub volume_delta_pct: f64,
    pub efficiency_delta_pct: f64,
    pub expansion_region_count: u32,
}

impl ScenarioParameters {
    pub fn with(mut self, parameter: ScenarioParameter, value: f64) -> Self {
        parameter.set(&mut self, value);
        self
    }

    /// Fail on the first delta outside `[DELTA_MIN, DELTA_MAX]`.
    pub fn validate(&self) -> Result<()> {
        for parameter in [
            ScenarioParameter::Price,
            ScenarioParameter::Cost,
            ScenarioParameter::Volume,
            ScenarioParameter::Efficiency,
        ] {
            ensure_range(parameter.field_name(), parameter.get(self), DELTA_MIN, DELTA_MAX)?;
        }
        Ok(())
    }
}

/// Named scenario parameter, used by sampling and sensitivity sweeps
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScenarioParameter {
    Price,
    Cost,
    Volume,
    Efficiency,
    Expansion,
}

impl ScenarioParameter {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Price => "price_delta_pct",
            Self::Cost => "cost_delta_pct",
            Self::Volume => "volume_delta_pct",
            Self::Efficiency => "efficiency_delta_pct",
            Self::Expansion => "expansion_region_count",
        }
    }

    /// Valid range of the parameter
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Self::Expansion => (0.0, u32::MAX as f64),
            _ => (DELTA_MIN, DELTA_MAX),
        }
    }

    pub fn get(&self, params: &ScenarioParameters) -> f64 {
        match self {
            Self::Price => params.price_delta_pct,
            Self::Cost => params.cost_delta_pct,
            Self::Volume => params.volume_delta_pct,
            Self::Efficiency => params.efficiency_delta_pct,
            Self::Expansion => params.expansion_region_count as f64,
        }
    }

    /// Set the parameter. Region counts are rounded and clamped to the `u32` range.
    pub fn set(&self, params: &mut ScenarioParameters, value: f64) {
        match self {
            Self::Price => params.price_delta_pct = value,
            Self::Cost => params.cost_delta_pct = value,
            Self::Volume => params.volume_delta_pct = value,
            Self::Efficiency => params.efficiency_delta_pct = value,
            Self::Expansion => {
                let (min, max) = self.bounds();
                let rounded = if value.is_finite() { value.round() } else { 0.0 };
                params.expansion_region_count = rounded.clamp(min, max) as u32;
            }
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Discrete go / no-go label derived from the projected profit change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RecommendationTier {
    StrongGo,
    Consider,
    Caution,
}

/// Projected minus baseline, absolute and relative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDeltas {
    pub revenue: f64,
    pub costs: f64,
    pub profit: f64,
    /// Percent changes; `None` where the baseline value is zero
    pub revenue_pct: Option<f64>,
    pub costs_pct: Option<f64>,
    pub profit_pct: Option<f64>,
}

/// Outcome of projecting a baseline under a set of parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub baseline: Financials,
    pub projected: Financials,
    pub deltas: ScenarioDeltas,
    pub recommendation_tier: RecommendationTier,
    pub baseline_margin: f64,
    pub projected_margin: f64,
}

impl ScenarioResult {
    /// Percentage profit change, undefined for a zero baseline profit
    pub fn profit_delta_pct(&self) -> Result<f64> {
        self.deltas
            .profit_pct
            .ok_or(ForesightError::DivisionUndefined { field: "profit" })
    }
}

/// Percent change from `base` to `new`.
pub fn percent_change(field: &'static str, base: f64, new: f64) -> Result<f64> {
    if base == 0.0 {
        return Err(ForesightError::DivisionUndefined { field });
    }
    Ok((new - base) / base * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use strum::IntoEnumIterator;

    fn record(day: u32, region: &str, revenue: f64, costs: f64) -> TimeSeriesRecord {
        TimeSeriesRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            revenue,
            costs,
            profit: revenue - costs,
            region: region.to_string(),
            product_category: "Services".to_string(),
            units_sold: 5.0,
            customer_satisfaction: 4.0,
        }
    }

    #[test]
    fn test_baseline_from_records() {
        let records = vec![
            record(1, "North", 1000.0, 600.0),
            record(2, "South", 2000.0, 1500.0),
            record(3, "North", 3000.0, 2000.0),
        ];

        let baseline = BaselineFinancials::from_records(&records);
        assert_eq!(baseline.revenue, 6000.0);
        assert_eq!(baseline.costs, 4100.0);
        assert_eq!(baseline.profit, 1900.0);
        assert_eq!(baseline.avg_region_revenue, 3000.0);
    }

    #[test]
    fn test_baseline_profit_follows_revenue_and_costs() {
        let mut loss = record(1, "North", 0.1, 0.3);
        loss.profit = -0.2;
        let mut gain = record(2, "North", 0.2, 0.0);
        gain.profit = 0.2;

        let baseline = BaselineFinancials::from_records(&[loss, gain]);
        assert_eq!(baseline.profit, baseline.revenue - baseline.costs);
        assert_eq!(BaselineFinancials::new(500.0, 800.0).profit, -300.0);
    }

    #[test]
    fn test_baseline_from_empty_history() {
        let baseline = BaselineFinancials::from_records(&[]);
        assert_eq!(baseline.revenue, 0.0);
        assert_eq!(baseline.avg_region_revenue, 0.0);
    }

    #[test]
    fn test_margin() {
        let f = Financials { revenue: 200.0, costs: 150.0, profit: 50.0 };
        assert_eq!(f.margin(), 0.25);
        let empty = Financials { revenue: 0.0, costs: 10.0, profit: -10.0 };
        assert_eq!(empty.margin(), 0.0);
    }

    #[test]
    fn test_validate_names_offending_field() {
        let params = ScenarioParameters::default().with(ScenarioParameter::Efficiency, 5.5);
        match params.validate() {
            Err(ForesightError::InvalidParameterRange { field, .. }) => {
                assert_eq!(field, "efficiency_delta_pct")
            }
            other => panic!("expected InvalidParameterRange, got {other:?}"),
        }
    }

    #[test]
    fn test_parameter_get_set_roundtrip() {
        let mut params = ScenarioParameters::default();
        for parameter in ScenarioParameter::iter() {
            parameter.set(&mut params, 2.0);
            assert_eq!(parameter.get(&params), 2.0);
        }
    }

    #[test]
    fn test_expansion_rounds_and_floors() {
        let mut params = ScenarioParameters::default();
        ScenarioParameter::Expansion.set(&mut params, 2.6);
        assert_eq!(params.expansion_region_count, 3);
        ScenarioParameter::Expansion.set(&mut params, -1.4);
        assert_eq!(params.expansion_region_count, 0);
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(RecommendationTier::StrongGo.to_string(), "strong-go");
        let json = serde_json::to_string(&RecommendationTier::Consider).unwrap();
        assert_eq!(json, "\"consider\"");
    }

    #[test]
    fn test_percent_change_zero_base() {
        assert!(matches!(
            percent_change("profit", 0.0, 10.0),
            Err(ForesightError::DivisionUndefined { field: "profit" })
        ));
        let pct = percent_change("revenue", 100.0, 110.0).unwrap();
        assert!((pct - 10.0).abs() < 1e-9);
    }
}
