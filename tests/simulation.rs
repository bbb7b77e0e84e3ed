//! Scenario projection, Monte Carlo and sensitivity sweeps over a real history.

mod common;

use business_foresight::domain::{
    BaselineFinancials, RecommendationTier, ScenarioParameter, ScenarioParameters,
};
use business_foresight::simulation::{
    sweep, DistributionSpec, MonteCarloEngine, ParameterDistribution, ScenarioEngine,
};
use business_foresight::ForesightError;
use common::weekly_history;
use proptest::prelude::*;

fn baseline() -> BaselineFinancials {
    BaselineFinancials::new(100_000.0, 70_000.0)
}

#[test]
fn baseline_from_history_splits_revenue_by_region() {
    let records = weekly_history(30);
    let baseline = BaselineFinancials::from_records(&records);
    let revenue: f64 = records.iter().map(|r| r.revenue).sum();

    assert!((baseline.revenue - revenue).abs() < 1e-6);
    assert!((baseline.avg_region_revenue - revenue / 3.0).abs() < 1e-6);

    let params = ScenarioParameters {
        expansion_region_count: 1,
        ..ScenarioParameters::default()
    };
    let result = ScenarioEngine::default().apply(&baseline, &params).unwrap();
    assert!((result.projected.revenue - revenue * 4.0 / 3.0).abs() < 1e-6);
}

#[test]
fn zero_deltas_reproduce_baseline_built_from_history() {
    let mut records = weekly_history(2);
    records[0].revenue = 0.1;
    records[0].costs = 0.3;
    records[0].profit = -0.2;
    records[1].revenue = 0.2;
    records[1].costs = 0.0;
    records[1].profit = 0.2;

    let baseline = BaselineFinancials::from_records(&records);
    let result = ScenarioEngine::default()
        .apply(&baseline, &ScenarioParameters::default())
        .unwrap();

    assert_eq!(result.projected, result.baseline);
    assert_eq!(result.deltas.profit, 0.0);
    assert_eq!(result.recommendation_tier, RecommendationTier::Caution);
}

#[test]
fn combined_scenario() {
    let params = ScenarioParameters {
        price_delta_pct: 0.05,
        cost_delta_pct: 0.02,
        volume_delta_pct: -0.03,
        efficiency_delta_pct: 0.10,
        expansion_region_count: 0,
    };
    let result = ScenarioEngine::default().apply(&baseline(), &params).unwrap();

    let revenue = 100_000.0 * 1.05 * 0.97;
    let costs = 70_000.0 * 1.02 * 0.90;
    assert!((result.projected.revenue - revenue).abs() < 1e-6);
    assert!((result.projected.costs - costs).abs() < 1e-6);
    assert!((result.projected.profit - (revenue - costs)).abs() < 1e-6);
    assert_eq!(result.recommendation_tier, RecommendationTier::StrongGo);
    assert!(result.projected_margin > result.baseline_margin);
}

#[test]
fn monte_carlo_is_reproducible_end_to_end() {
    let baseline = BaselineFinancials::from_records(&weekly_history(90));
    let spec = DistributionSpec::from_volatility(0.10, 0.05)
        .with(ScenarioParameter::Efficiency, ParameterDistribution::triangular(0.03));
    let params = ScenarioParameters {
        price_delta_pct: 0.05,
        ..ScenarioParameters::default()
    };
    let engine = MonteCarloEngine::new(ScenarioEngine::default());

    let a = engine.run(&baseline, &params, &spec, 1000, 42).unwrap();
    let b = engine.run(&baseline, &params, &spec, 1000, 42).unwrap();
    assert_eq!(a, b);
    assert!(a.p5 <= a.p50 && a.p50 <= a.p95);
    assert!(a.std_profit > 0.0);
}

#[test]
fn monte_carlo_rejects_negative_spread() {
    let spec = DistributionSpec::from_volatility(0.1, -0.05);
    let err = MonteCarloEngine::new(ScenarioEngine::default())
        .run(&baseline(), &ScenarioParameters::default(), &spec, 100, 1)
        .unwrap_err();
    match err {
        ForesightError::InvalidParameterRange { field, .. } => {
            assert_eq!(field, "cost_delta_pct.std")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn sensitivity_of_costs_is_decreasing() {
    let points = sweep(
        &ScenarioEngine::default(),
        &baseline(),
        ScenarioParameter::Cost,
        -0.3,
        0.3,
        7,
    )
    .unwrap();
    assert!(points.windows(2).all(|w| w[1].profit < w[0].profit));
    assert!(points.iter().all(|p| (p.revenue - 100_000.0).abs() < 1e-6));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn percentiles_are_ordered(seed in any::<u64>(), price_std in 0.0f64..0.5, cost_std in 0.0f64..0.5) {
        let summary = MonteCarloEngine::new(ScenarioEngine::default())
            .run(
                &baseline(),
                &ScenarioParameters::default(),
                &DistributionSpec::from_volatility(price_std, cost_std),
                200,
                seed,
            )
            .unwrap();
        prop_assert!(summary.p5 <= summary.p50);
        prop_assert!(summary.p50 <= summary.p95);
        prop_assert!((0.0..=1.0).contains(&summary.probability_profitable));
    }

    #[test]
    fn zero_parameters_keep_baseline(revenue in 0.0f64..1e7, costs in 0.0f64..1e7) {
        let base = BaselineFinancials::new(revenue, costs);
        let result = ScenarioEngine::default()
            .apply(&base, &ScenarioParameters::default())
            .unwrap();
        prop_assert_eq!(result.projected, result.baseline);
    }
}
