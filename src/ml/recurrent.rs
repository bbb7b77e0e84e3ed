//! Recurrent Sequence Forecaster
//!
//! Single-layer Elman network (tanh hidden state, linear readout) trained with
//! Adam on min-max normalized sliding windows. Training is reproducible for a
//! fixed seed: weight initialization and mini-batch shuffling both draw from
//! one seeded generator.
//!
//! - Chronological validation split, no shuffling across the split
//! - Early stopping on validation loss, best weights restored
//! - Predictions are denormalized before being fed back as inputs

use chrono::Utc;
use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    assemble_forecast, ensure_horizon, last_date, mse, recursive_forecast, EarlyStopping,
    EpochOutcome, Forecaster, MinMaxScaler, ModelHandle, ModelMetadata, ModelState,
    TrainingDataset,
};
use crate::config::{Config, SequenceConfig};
use crate::domain::{
    history_fingerprint, target_series, ForecastResult, ModelKind, TargetMetric, TimeSeriesRecord,
};
use crate::error::{ForesightError, Result};
use crate::forecast::{population_std, ConfidenceBand, ForecastMetrics, FEATURE_SCHEMA_VERSION};

const MAX_GRAD_NORM: f64 = 5.0;

/// Network weights. Input dimension is 1 (one normalized value per step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentParams {
    w_x: Array1<f64>,
    w_h: Array2<f64>,
    b_h: Array1<f64>,
    w_y: Array1<f64>,
    b_y: f64,
}

impl RecurrentParams {
    fn init<R: Rng>(hidden: usize, rng: &mut R) -> Self {
        let scale = 1.0 / (hidden as f64).sqrt();
        let dist = Uniform::new_inclusive(-scale, scale);
        Self {
            w_x: Array1::from_shape_fn(hidden, |_| rng.sample(dist)),
            w_h: Array2::from_shape_fn((hidden, hidden), |_| rng.sample(dist)),
            b_h: Array1::zeros(hidden),
            w_y: Array1::from_shape_fn(hidden, |_| rng.sample(dist)),
            b_y: 0.0,
        }
    }

    fn zeros(hidden: usize) -> Self {
        Self {
            w_x: Array1::zeros(hidden),
            w_h: Array2::zeros((hidden, hidden)),
            b_h: Array1::zeros(hidden),
            w_y: Array1::zeros(hidden),
            b_y: 0.0,
        }
    }

    fn hidden_size(&self) -> usize {
        self.b_h.len()
    }

    /// Hidden states `h_0..=h_T` and the readout of `h_T`
    fn forward(&self, inputs: &[f64]) -> (Vec<Array1<f64>>, f64) {
        let mut states = Vec::with_capacity(inputs.len() + 1);
        states.push(Array1::zeros(self.hidden_size()));

        for &x in inputs {
            let next = {
                let prev = &states[states.len() - 1];
                (&self.w_x * x + self.w_h.dot(prev) + &self.b_h).mapv(f64::tanh)
            };
            states.push(next);
        }

        let output = self.w_y.dot(&states[inputs.len()]) + self.b_y;
        (states, output)
    }

    fn predict(&self, inputs: &[f64]) -> f64 {
        self.forward(inputs).1
    }

    /// Backpropagation through time of `scale * (y - target)^2`, added into `grads`.
    fn accumulate_gradients(&self, inputs: &[f64], target: f64, scale: f64, grads: &mut Self) {
        let (states, output) = self.forward(inputs);
        let d_out = 2.0 * (output - target) * scale;

        grads.w_y.scaled_add(d_out, &states[inputs.len()]);
        grads.b_y += d_out;

        let mut d_h = &self.w_y * d_out;
        for t in (1..=inputs.len()).rev() {
            let d_a = &d_h * &states[t].mapv(|h| 1.0 - h * h);

            grads.w_x.scaled_add(inputs[t - 1], &d_a);
            let outer = d_a
                .view()
                .insert_axis(Axis(1))
                .dot(&states[t - 1].view().insert_axis(Axis(0)));
            grads.w_h += &outer;
            grads.b_h += &d_a;

            d_h = self.w_h.t().dot(&d_a);
        }
    }

    fn norm(&self) -> f64 {
        let sum_sq = self.w_x.iter().map(|v| v * v).sum::<f64>()
            + self.w_h.iter().map(|v| v * v).sum::<f64>()
            + self.b_h.iter().map(|v| v * v).sum::<f64>()
            + self.w_y.iter().map(|v| v * v).sum::<f64>()
            + self.b_y * self.b_y;
        sum_sq.sqrt()
    }

    fn clip_norm(&mut self, max_norm: f64) {
        let norm = self.norm();
        if norm > max_norm {
            let factor = max_norm / norm;
            self.w_x *= factor;
            self.w_h *= factor;
            self.b_h *= factor;
            self.w_y *= factor;
            self.b_y *= factor;
        }
    }

    fn is_finite(&self) -> bool {
        self.w_x.iter().all(|v| v.is_finite())
            && self.w_h.iter().all(|v| v.is_finite())
            && self.b_h.iter().all(|v| v.is_finite())
            && self.w_y.iter().all(|v| v.is_finite())
            && self.b_y.is_finite()
    }
}

/// Bias-corrected Adam hyperparameters for one update
#[derive(Debug, Clone, Copy)]
struct AdamStep {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    correction1: f64,
    correction2: f64,
}

impl AdamStep {
    fn apply(&self, p: &mut f64, m: &mut f64, v: &mut f64, g: f64) {
        *m = self.beta1 * *m + (1.0 - self.beta1) * g;
        *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
        let m_hat = *m / self.correction1;
        let v_hat = *v / self.correction2;
        *p -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
    }

    fn apply_array<D: Dimension>(
        &self,
        p: &mut Array<f64, D>,
        m: &mut Array<f64, D>,
        v: &mut Array<f64, D>,
        g: &Array<f64, D>,
    ) {
        Zip::from(p)
            .and(m)
            .and(v)
            .and(g)
            .for_each(|p, m, v, &g| self.apply(p, m, v, g));
    }
}

struct Adam {
    lr: f64,
    step: i32,
    m: RecurrentParams,
    v: RecurrentParams,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;

    fn new(lr: f64, hidden: usize) -> Self {
        Self {
            lr,
            step: 0,
            m: RecurrentParams::zeros(hidden),
            v: RecurrentParams::zeros(hidden),
        }
    }

    fn update(&mut self, params: &mut RecurrentParams, grads: &RecurrentParams) {
        self.step += 1;
        let step = AdamStep {
            lr: self.lr,
            beta1: Self::BETA1,
            beta2: Self::BETA2,
            eps: 1e-8,
            correction1: 1.0 - Self::BETA1.powi(self.step),
            correction2: 1.0 - Self::BETA2.powi(self.step),
        };

        step.apply_array(&mut params.w_x, &mut self.m.w_x, &mut self.v.w_x, &grads.w_x);
        step.apply_array(&mut params.w_h, &mut self.m.w_h, &mut self.v.w_h, &grads.w_h);
        step.apply_array(&mut params.b_h, &mut self.m.b_h, &mut self.v.b_h, &grads.b_h);
        step.apply_array(&mut params.w_y, &mut self.m.w_y, &mut self.v.w_y, &grads.w_y);
        step.apply(&mut params.b_y, &mut self.m.b_y, &mut self.v.b_y, grads.b_y);
    }
}

fn dataset_loss(params: &RecurrentParams, dataset: &TrainingDataset<Vec<f64>>) -> f64 {
    let predictions: Vec<f64> = dataset.inputs.iter().map(|w| params.predict(w)).collect();
    mse(&predictions, &dataset.targets)
}

/// Trained network plus the scaler and window it was trained with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrentModel {
    window: usize,
    scaler: MinMaxScaler,
    params: RecurrentParams,
    epochs_trained: usize,
    best_validation_loss: f64,
}

impl RecurrentModel {
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn hidden_size(&self) -> usize {
        self.params.hidden_size()
    }

    pub fn scaler(&self) -> MinMaxScaler {
        self.scaler
    }

    pub fn epochs_trained(&self) -> usize {
        self.epochs_trained
    }

    pub fn best_validation_loss(&self) -> f64 {
        self.best_validation_loss
    }

    /// Next value after `values`, in original units. Only the trailing window is read.
    pub fn predict_next(&self, values: &[f64]) -> Result<f64> {
        if values.len() < self.window {
            return Err(ForesightError::WindowTooShort {
                window: self.window,
                actual: values.len(),
            });
        }
        let tail = &values[values.len() - self.window..];
        let normalized = self.scaler.transform_all(tail);
        Ok(self.scaler.inverse_transform(self.params.predict(&normalized)))
    }
}

/// Recurrent forecaster over the raw target series
#[derive(Debug, Clone)]
pub struct SequenceForecaster {
    config: SequenceConfig,
    band: ConfidenceBand,
}

impl SequenceForecaster {
    pub fn new(config: SequenceConfig, band: ConfidenceBand) -> Self {
        Self { config, band }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.sequence.clone(),
            ConfidenceBand::new(config.forecast.confidence_level),
        )
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Train on windows of `window` values. Needs at least `window + 1` records.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn train_with_window(
        &self,
        records: &[TimeSeriesRecord],
        target: TargetMetric,
        window: usize,
    ) -> Result<ModelHandle> {
        if window == 0 {
            return Err(ForesightError::out_of_range("window", 0.0, 1.0, f64::INFINITY));
        }
        if self.config.hidden_size == 0 {
            return Err(ForesightError::out_of_range(
                "hidden_size",
                0.0,
                1.0,
                f64::INFINITY,
            ));
        }

        let values = target_series(records, target);
        if values.len() < window + 1 {
            return Err(ForesightError::WindowTooShort {
                window,
                actual: values.len(),
            });
        }

        let scaler = MinMaxScaler::fit(&values)?;
        let dataset = TrainingDataset::from_windows(&scaler.transform_all(&values), window);
        let (train, validation) = dataset.split(self.config.validation_split)?;
        if validation.is_empty() {
            warn!(samples = train.len(), "no validation windows, early stopping uses training loss");
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut params = RecurrentParams::init(self.config.hidden_size, &mut rng);
        let mut adam = Adam::new(self.config.learning_rate, self.config.hidden_size);
        let mut stopper = EarlyStopping::new(self.config.early_stopping_patience);
        let mut best = params.clone();
        let mut epochs_trained = 0;

        let mut order: Vec<usize> = (0..train.len()).collect();
        let batch_size = self.config.batch_size.max(1);

        for epoch in 0..self.config.max_epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(batch_size) {
                let mut grads = RecurrentParams::zeros(self.config.hidden_size);
                let scale = 1.0 / batch.len() as f64;
                for &i in batch {
                    params.accumulate_gradients(&train.inputs[i], train.targets[i], scale, &mut grads);
                }
                grads.clip_norm(MAX_GRAD_NORM);
                adam.update(&mut params, &grads);
            }
            epochs_trained = epoch + 1;

            let train_loss = dataset_loss(&params, &train);
            let val_loss = if validation.is_empty() {
                train_loss
            } else {
                dataset_loss(&params, &validation)
            };

            if !(train_loss.is_finite() && val_loss.is_finite() && params.is_finite()) {
                return Err(ForesightError::DivergentTraining {
                    epoch,
                    detail: format!("train loss {train_loss}, validation loss {val_loss}"),
                });
            }

            debug!(epoch, train_loss, val_loss, "epoch complete");

            match stopper.observe(epoch, val_loss) {
                EpochOutcome::Improved => best = params.clone(),
                EpochOutcome::NoImprovement => {}
                EpochOutcome::Stop => {
                    debug!(epoch, best_epoch = stopper.best_epoch(), "early stopping");
                    break;
                }
            }
        }

        let model = RecurrentModel {
            window,
            scaler,
            params: best,
            epochs_trained,
            best_validation_loss: stopper.best_loss(),
        };

        let mut fitted = Vec::with_capacity(values.len() - window);
        for end in window..values.len() {
            fitted.push(model.predict_next(&values[..end])?);
        }
        let actual = &values[window..];
        let residuals: Vec<f64> = actual.iter().zip(&fitted).map(|(a, f)| a - f).collect();
        let residual_std = population_std(&residuals);
        let metrics = ForecastMetrics::calculate(actual, &fitted)?;

        info!(
            window,
            epochs = epochs_trained,
            residual_std,
            quality = %metrics.quality(),
            "sequence model trained"
        );

        let metadata = ModelMetadata {
            model_id: Uuid::new_v4().to_string(),
            model_kind: ModelKind::Sequence,
            target_metric: target,
            trained_at: Utc::now(),
            feature_schema_version: FEATURE_SCHEMA_VERSION,
            residual_std,
            training_samples: dataset.len(),
            history_fingerprint: history_fingerprint(records, target),
            metrics: Some(metrics),
        };

        Ok(ModelHandle::new(metadata, ModelState::Sequence(model)))
    }
}

impl Forecaster for SequenceForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Sequence
    }

    fn train(&self, records: &[TimeSeriesRecord], target: TargetMetric) -> Result<ModelHandle> {
        self.train_with_window(records, target, self.config.window)
    }

    fn predict(
        &self,
        handle: &ModelHandle,
        history: &[TimeSeriesRecord],
        horizon: usize,
    ) -> Result<ForecastResult> {
        let ModelState::Sequence(model) = handle.state() else {
            return Err(handle.not_trained(ModelKind::Sequence));
        };
        ensure_horizon(horizon)?;

        if history.len() < model.window() {
            return Err(ForesightError::WindowTooShort {
                window: model.window(),
                actual: history.len(),
            });
        }
        let start = last_date(history, model.window())?;
        let values = target_series(history, handle.target());

        let (dates, points) =
            recursive_forecast(&values, start, horizon, |working, _| model.predict_next(working))?;

        Ok(assemble_forecast(handle, &self.band, dates, points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn history(values: impl IntoIterator<Item = f64>) -> Vec<TimeSeriesRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| TimeSeriesRecord {
                date: start + chrono::Duration::days(i as i64),
                revenue: v,
                costs: v * 0.8,
                profit: v * 0.2,
                region: "North".to_string(),
                product_category: "Software".to_string(),
                units_sold: 12.0,
                customer_satisfaction: 4.6,
            })
            .collect()
    }

    fn forecaster(max_epochs: usize) -> SequenceForecaster {
        SequenceForecaster::new(
            SequenceConfig {
                hidden_size: 8,
                max_epochs,
                ..SequenceConfig::default()
            },
            ConfidenceBand::new(0.95),
        )
    }

    fn wave() -> Vec<TimeSeriesRecord> {
        history((0..40).map(|i| 1000.0 + 200.0 * (i as f64 * 0.9).sin()))
    }

    #[test]
    fn test_window_too_short() {
        let records = history((0..7).map(f64::from));
        let err = forecaster(5)
            .train_with_window(&records, TargetMetric::Revenue, 7)
            .unwrap_err();
        assert!(matches!(err, ForesightError::WindowTooShort { window: 7, actual: 7 }));
    }

    #[test]
    fn test_single_window_trains() {
        let records = history((0..8).map(|i| 10.0 + i as f64));
        let handle = forecaster(5)
            .train_with_window(&records, TargetMetric::Revenue, 7)
            .unwrap();
        assert_eq!(handle.metadata().training_samples, 1);
    }

    #[test]
    fn test_same_seed_same_forecast() {
        let records = wave();
        let f = forecaster(30);
        let a = f.train(&records, TargetMetric::Revenue).unwrap();
        let b = f.train(&records, TargetMetric::Revenue).unwrap();

        let pa = f.predict(&a, &records, 5).unwrap();
        let pb = f.predict(&b, &records, 5).unwrap();
        assert_eq!(pa.point_values, pb.point_values);
        assert_eq!(a.metadata().residual_std, b.metadata().residual_std);
    }

    #[test]
    fn test_constant_series_forecasts_constant() {
        let records = history(std::iter::repeat(250.0).take(20));
        let f = forecaster(10);
        let handle = f.train(&records, TargetMetric::Revenue).unwrap();
        assert_eq!(handle.metadata().residual_std, 0.0);

        let result = f.predict(&handle, &records, 4).unwrap();
        assert_eq!(result.point_values, vec![250.0; 4]);
        assert_eq!(result.lower_bound, result.upper_bound);
    }

    #[test]
    fn test_forecast_band_and_dates() {
        let records = wave();
        let f = forecaster(40);
        let handle = f.train(&records, TargetMetric::Revenue).unwrap();
        let result = f.predict(&handle, &records, 10).unwrap();

        assert_eq!(result.horizon, 10);
        assert_eq!(result.dates[9], records[39].date + chrono::Duration::days(10));
        for i in 0..10 {
            assert!(result.point_values[i].is_finite());
            assert!(result.lower_bound[i] <= result.point_values[i]);
            assert!(result.point_values[i] <= result.upper_bound[i]);
        }
    }

    #[test]
    fn test_predict_needs_window_of_history() {
        let records = wave();
        let f = forecaster(5);
        let handle = f.train(&records, TargetMetric::Revenue).unwrap();
        let short = &records[..3];
        assert!(matches!(
            f.predict(&handle, short, 2),
            Err(ForesightError::WindowTooShort { window: 7, actual: 3 })
        ));
    }

    #[test]
    fn test_nan_learning_rate_diverges() {
        let records = wave();
        let f = SequenceForecaster::new(
            SequenceConfig {
                learning_rate: f64::NAN,
                ..SequenceConfig::default()
            },
            ConfidenceBand::new(0.95),
        );
        assert!(matches!(
            f.train(&records, TargetMetric::Revenue),
            Err(ForesightError::DivergentTraining { epoch: 0, .. })
        ));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = RecurrentParams::init(3, &mut rng);
        let inputs = [0.2, 0.5, 0.9];
        let target = 0.4;

        let mut grads = RecurrentParams::zeros(3);
        params.accumulate_gradients(&inputs, target, 1.0, &mut grads);

        let loss = |p: &RecurrentParams| (p.predict(&inputs) - target).powi(2);
        let eps = 1e-6;
        let mut bumped = params.clone();
        bumped.w_h[[1, 2]] += eps;
        let numeric = (loss(&bumped) - loss(&params)) / eps;
        assert!((numeric - grads.w_h[[1, 2]]).abs() < 1e-4);

        let mut bumped = params.clone();
        bumped.b_y += eps;
        let numeric = (loss(&bumped) - loss(&params)) / eps;
        assert!((numeric - grads.b_y).abs() < 1e-4);
    }
}
