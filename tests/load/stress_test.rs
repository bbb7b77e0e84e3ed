//! Load Testing Suite
//!
//! - Many threads forecasting through one shared cache
//! - Maximum-size Monte Carlo runs, sequential against parallel
//!
//! Requirements:
//! - Concurrent forecasts never observe a half-trained model
//! - A 5000-iteration run finishes well under the latency budget

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use business_foresight::config::Config;
use business_foresight::domain::{
    BaselineFinancials, ModelKind, ScenarioParameters, TargetMetric,
};
use business_foresight::forecast::{ForecastService, ModelCache};
use business_foresight::simulation::{
    DistributionSpec, MonteCarloEngine, ScenarioEngine, MAX_ITERATIONS,
};
use business_foresight::ForesightError;

use crate::common::weekly_history;

#[test]
#[ignore]
fn concurrent_forecasts_share_one_model() {
    let mut cfg = Config::default();
    cfg.tree.n_estimators = 30;
    let service = Arc::new(ForecastService::new(&cfg, Arc::new(ModelCache::new())).unwrap());
    let records = Arc::new(weekly_history(120));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = Arc::clone(&service);
            let records = Arc::clone(&records);
            thread::spawn(move || {
                let mut ok = 0;
                for _ in 0..20 {
                    match service.forecast(&records, TargetMetric::Revenue, ModelKind::Tree, 7) {
                        Ok(result) => {
                            assert_eq!(result.point_values.len(), 7);
                            ok += 1;
                        }
                        // another thread holds the training slot
                        Err(ForesightError::TrainingInProgress { .. }) => {
                            thread::sleep(Duration::from_millis(5))
                        }
                        Err(e) => panic!("forecast failed: {e}"),
                    }
                }
                ok
            })
        })
        .collect();

    let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert!(succeeded > 0);
    assert_eq!(service.cache().len(), 1);
}

#[test]
#[ignore]
fn max_iterations_latency() {
    let baseline = BaselineFinancials::from_records(&weekly_history(365));
    let spec = DistributionSpec::from_volatility(0.10, 0.05);
    let params = ScenarioParameters::default();

    let parallel = MonteCarloEngine::new(ScenarioEngine::default()).with_parallel(true);
    let start = Instant::now();
    let a = parallel
        .run(&baseline, &params, &spec, MAX_ITERATIONS, 42)
        .unwrap();
    let elapsed = start.elapsed();

    let sequential = MonteCarloEngine::new(ScenarioEngine::default()).with_parallel(false);
    let b = sequential
        .run(&baseline, &params, &spec, MAX_ITERATIONS, 42)
        .unwrap();

    assert_eq!(a, b);
    assert!(
        elapsed < Duration::from_secs(2),
        "monte carlo took {elapsed:?}"
    );
}
