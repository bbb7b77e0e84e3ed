//! End-to-end forecasting through `ForecastService`.

mod common;

use business_foresight::config::Config;
use business_foresight::domain::{ModelKind, TargetMetric};
use business_foresight::forecast::{CacheKey, ForecastService, ModelCache};
use business_foresight::ForesightError;
use common::{constant_history, weekly_history};
use rstest::rstest;
use std::sync::Arc;

fn quick_config() -> Config {
    let mut cfg = Config::default();
    cfg.tree.n_estimators = 25;
    cfg.sequence.max_epochs = 15;
    cfg.sequence.hidden_size = 6;
    cfg
}

fn service() -> ForecastService {
    ForecastService::new(&quick_config(), Arc::new(ModelCache::new())).unwrap()
}

#[rstest]
#[case(ModelKind::Tree, TargetMetric::Revenue)]
#[case(ModelKind::Tree, TargetMetric::Profit)]
#[case(ModelKind::Sequence, TargetMetric::Revenue)]
#[case(ModelKind::Sequence, TargetMetric::Profit)]
fn forecast_has_requested_shape(#[case] kind: ModelKind, #[case] target: TargetMetric) {
    let records = weekly_history(60);
    let result = service().forecast(&records, target, kind, 14).unwrap();

    assert_eq!(result.horizon, 14);
    assert_eq!(result.point_values.len(), 14);
    assert_eq!(result.lower_bound.len(), 14);
    assert_eq!(result.upper_bound.len(), 14);
    assert_eq!(result.model_kind, kind);
    assert_eq!(result.target_metric, target);

    let last = records.last().unwrap().date;
    for (i, date) in result.dates.iter().enumerate() {
        assert_eq!(*date, last + chrono::Duration::days(i as i64 + 1));
    }
    for i in 0..14 {
        assert!(result.lower_bound[i] <= result.point_values[i]);
        assert!(result.point_values[i] <= result.upper_bound[i]);
    }
}

#[rstest]
#[case(ModelKind::Tree)]
#[case(ModelKind::Sequence)]
fn band_never_narrows(#[case] kind: ModelKind) {
    let result = service()
        .forecast(&weekly_history(45), TargetMetric::Revenue, kind, 10)
        .unwrap();
    let widths: Vec<f64> = (0..10).map(|i| result.band_width(i).unwrap()).collect();
    assert!(widths.windows(2).all(|w| w[1] >= w[0]));
}

#[rstest]
#[case(ModelKind::Tree)]
#[case(ModelKind::Sequence)]
fn constant_history_forecasts_constant(#[case] kind: ModelKind) {
    let records = constant_history(30, 800.0);
    let result = service()
        .forecast(&records, TargetMetric::Revenue, kind, 5)
        .unwrap();
    for i in 0..5 {
        assert!((result.point_values[i] - 800.0).abs() < 1e-6);
        assert!(result.band_width(i).unwrap() < 1e-6);
    }
}

#[test]
fn tree_tracks_weekly_pattern() {
    let records = weekly_history(84);
    let result = service()
        .forecast(&records, TargetMetric::Revenue, ModelKind::Tree, 7)
        .unwrap();
    let mean = result.total() / 7.0;
    // recent level is about 1000 + 2.5 * 84 plus the weekly average
    assert!(mean > 1_100.0 && mean < 1_400.0, "mean forecast {mean}");
}

#[test]
fn short_history_is_rejected() {
    let svc = service();
    let records = weekly_history(7);
    assert!(matches!(
        svc.forecast(&records, TargetMetric::Revenue, ModelKind::Tree, 3),
        Err(ForesightError::InsufficientHistory { required: 8, actual: 7 })
    ));
    assert!(matches!(
        svc.forecast(&records, TargetMetric::Revenue, ModelKind::Sequence, 3),
        Err(ForesightError::WindowTooShort { window: 7, actual: 7 })
    ));
}

#[test]
fn unordered_history_is_rejected() {
    let mut records = weekly_history(20);
    records.swap(4, 5);
    assert!(matches!(
        service().forecast(&records, TargetMetric::Revenue, ModelKind::Tree, 3),
        Err(ForesightError::InvalidHistory { index: 5, .. })
    ));
}

#[test]
fn services_share_an_explicit_cache() {
    let cache = Arc::new(ModelCache::new());
    let cfg = quick_config();
    let a = ForecastService::new(&cfg, Arc::clone(&cache)).unwrap();
    let b = ForecastService::new(&cfg, Arc::clone(&cache)).unwrap();
    let records = weekly_history(40);

    a.forecast(&records, TargetMetric::Profit, ModelKind::Tree, 3)
        .unwrap();
    let trained = cache
        .get(&CacheKey::new(ModelKind::Tree, TargetMetric::Profit))
        .unwrap();

    b.forecast(&records, TargetMetric::Profit, ModelKind::Tree, 3)
        .unwrap();
    let reused = cache
        .get(&CacheKey::new(ModelKind::Tree, TargetMetric::Profit))
        .unwrap();
    assert!(Arc::ptr_eq(&trained, &reused));
}

#[test]
fn training_slot_is_exclusive() {
    let cache = Arc::new(ModelCache::new());
    let svc = ForecastService::new(&quick_config(), Arc::clone(&cache)).unwrap();
    let key = CacheKey::new(ModelKind::Tree, TargetMetric::Revenue);

    let _slot = cache.begin_training(key).unwrap();
    assert!(matches!(
        svc.train(&weekly_history(30), TargetMetric::Revenue, ModelKind::Tree),
        Err(ForesightError::TrainingInProgress { .. })
    ));
}

#[test]
fn readers_keep_their_handle_across_retrain() {
    let svc = service();
    let records = weekly_history(40);
    let old = svc
        .train(&records, TargetMetric::Revenue, ModelKind::Tree)
        .unwrap();
    let new = svc
        .train(&records, TargetMetric::Revenue, ModelKind::Tree)
        .unwrap();

    assert_ne!(old.metadata().model_id, new.metadata().model_id);
    // the old handle is still a complete model
    assert_eq!(old.metadata().target_metric, TargetMetric::Revenue);
    assert!(old.metadata().residual_std.is_finite());
}
