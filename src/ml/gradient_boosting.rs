//! Gradient-Boosted Regression Trees
//!
//! Additive ensemble of SmartCore decision trees, each fitted to the residuals
//! of the ensemble before it. Forecasts one step at a time over engineered
//! features and rolls forward recursively.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    assemble_forecast, ensure_horizon, last_date, recursive_forecast, Forecaster, ModelHandle,
    ModelMetadata, ModelState, TrainingDataset,
};
use crate::config::{Config, TreeConfig};
use crate::domain::{
    history_fingerprint, target_series, ForecastResult, ModelKind, TargetMetric, TimeSeriesRecord,
};
use crate::error::{ForesightError, Result};
use crate::forecast::{
    population_std, ConfidenceBand, FeatureSchema, FeatureVector, ForecastMetrics,
    TimeSeriesFeaturizer,
};

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Trained boosted ensemble together with the feature layout it expects
#[derive(Serialize, Deserialize)]
pub struct GradientBoostedModel {
    schema: FeatureSchema,
    base_prediction: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl fmt::Debug for GradientBoostedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientBoostedModel")
            .field("schema", &self.schema)
            .field("base_prediction", &self.base_prediction)
            .field("learning_rate", &self.learning_rate)
            .field("n_trees", &self.trees.len())
            .finish()
    }
}

impl GradientBoostedModel {
    /// Fit `config.n_estimators` stages of shrunken residual trees.
    pub fn fit(
        dataset: &TrainingDataset<Vec<f64>>,
        schema: FeatureSchema,
        config: &TreeConfig,
    ) -> Result<Self> {
        if dataset.is_empty() {
            return Err(ForesightError::InsufficientHistory {
                required: schema.warmup() + 1,
                actual: 0,
            });
        }

        let x = to_matrix(&dataset.inputs, schema.width())?;
        let y = &dataset.targets;
        let base_prediction = y.iter().sum::<f64>() / y.len() as f64;

        let params = DecisionTreeRegressorParameters::default()
            .with_max_depth(config.max_depth)
            .with_min_samples_leaf(config.min_samples_leaf)
            .with_min_samples_split(config.min_samples_split);

        let mut fitted = vec![base_prediction; y.len()];
        let mut trees = Vec::with_capacity(config.n_estimators);

        for stage in 0..config.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(t, f)| t - f).collect();

            let tree = Tree::fit(&x, &residuals, params.clone())
                .map_err(|e| ForesightError::Model(format!("tree {stage} failed to fit: {e:?}")))?;
            let update = tree
                .predict(&x)
                .map_err(|e| ForesightError::Model(format!("tree {stage} failed to predict: {e:?}")))?;

            for (f, u) in fitted.iter_mut().zip(update) {
                *f += config.learning_rate * u;
            }
            if fitted.iter().any(|v| !v.is_finite()) {
                return Err(ForesightError::DivergentTraining {
                    epoch: stage,
                    detail: "non-finite ensemble output".to_string(),
                });
            }

            trees.push(tree);
        }

        debug!(stages = trees.len(), base_prediction, "boosted ensemble fitted");

        Ok(Self {
            schema,
            base_prediction,
            learning_rate: config.learning_rate,
            trees,
        })
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Predict every row of a dataset
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let x = to_matrix(rows, self.schema.width())?;
        let mut out = vec![self.base_prediction; rows.len()];
        for tree in &self.trees {
            let update = tree
                .predict(&x)
                .map_err(|e| ForesightError::Model(format!("prediction failed: {e:?}")))?;
            for (o, u) in out.iter_mut().zip(update) {
                *o += self.learning_rate * u;
            }
        }
        Ok(out)
    }

    pub fn predict_one(&self, features: &FeatureVector) -> Result<f64> {
        let out = self.predict_rows(std::slice::from_ref(&features.features))?;
        out.first()
            .copied()
            .ok_or_else(|| ForesightError::Model("empty prediction".to_string()))
    }
}

fn to_matrix(rows: &[Vec<f64>], width: usize) -> Result<DenseMatrix<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            return Err(ForesightError::Model(format!(
                "feature vector has {} values, expected {width}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }
    Ok(DenseMatrix::new(rows.len(), width, flat, false))
}

/// Tree-ensemble forecaster over engineered features
#[derive(Debug, Clone)]
pub struct TreeForecaster {
    featurizer: TimeSeriesFeaturizer,
    config: TreeConfig,
    band: ConfidenceBand,
}

impl TreeForecaster {
    pub fn new(schema: FeatureSchema, config: TreeConfig, band: ConfidenceBand) -> Self {
        Self {
            featurizer: TimeSeriesFeaturizer::new(schema),
            config,
            band,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let schema = FeatureSchema::new(config.forecast.lookback, config.forecast.rolling_window)?;
        Ok(Self::new(
            schema,
            config.tree.clone(),
            ConfidenceBand::new(config.forecast.confidence_level),
        ))
    }
}

impl Forecaster for TreeForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Tree
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    fn train(&self, records: &[TimeSeriesRecord], target: TargetMetric) -> Result<ModelHandle> {
        let schema = self.featurizer.schema();
        let dataset = TrainingDataset::from_rows(self.featurizer.featurize(records, target)?);
        let model = GradientBoostedModel::fit(&dataset, schema, &self.config)?;

        let fitted = model.predict_rows(&dataset.inputs)?;
        let residuals: Vec<f64> = dataset
            .targets
            .iter()
            .zip(&fitted)
            .map(|(t, f)| t - f)
            .collect();
        let residual_std = population_std(&residuals);
        let metrics = ForecastMetrics::calculate(&dataset.targets, &fitted)?;

        info!(
            samples = dataset.len(),
            residual_std,
            r2 = metrics.r2,
            quality = %metrics.quality(),
            "tree model trained"
        );

        let metadata = ModelMetadata {
            model_id: Uuid::new_v4().to_string(),
            model_kind: ModelKind::Tree,
            target_metric: target,
            trained_at: Utc::now(),
            feature_schema_version: schema.version(),
            residual_std,
            training_samples: dataset.len(),
            history_fingerprint: history_fingerprint(records, target),
            metrics: Some(metrics),
        };

        Ok(ModelHandle::new(metadata, ModelState::Tree(model)))
    }

    fn predict(
        &self,
        handle: &ModelHandle,
        history: &[TimeSeriesRecord],
        horizon: usize,
    ) -> Result<ForecastResult> {
        let ModelState::Tree(model) = handle.state() else {
            return Err(handle.not_trained(ModelKind::Tree));
        };
        ensure_horizon(horizon)?;

        // the model's own layout wins over the current configuration
        let featurizer = TimeSeriesFeaturizer::new(model.schema());
        let start = last_date(history, model.schema().warmup())?;
        let values = target_series(history, handle.target());

        let (dates, points) = recursive_forecast(&values, start, horizon, |working, date| {
            let features = featurizer.next_features(working, date)?;
            model.predict_one(&features)
        })?;

        Ok(assemble_forecast(handle, &self.band, dates, points))
    }
}
