//! Feature engineering for forecasting models
//!
//! Turns an ordered daily history into supervised rows: lagged target values,
//! trailing rolling statistics, calendar encodings and a linear trend index.
//! Every feature of a row only looks at records strictly before the row's target.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{TargetMetric, TimeSeriesRecord};
use crate::error::{ForesightError, Result};

/// Bumped whenever the feature layout changes; persisted models carrying
/// another version are retrained.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Number of non-lag features (rolling mean/std, day of week, month, trend)
const EXTRA_FEATURES: usize = 5;

/// Feature layout of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub lookback: usize,
    pub rolling_window: usize,
}

impl FeatureSchema {
    pub fn new(lookback: usize, rolling_window: usize) -> Result<Self> {
        if lookback == 0 {
            return Err(ForesightError::out_of_range("lookback", 0.0, 1.0, f64::INFINITY));
        }
        if rolling_window == 0 {
            return Err(ForesightError::out_of_range("rolling_window", 0.0, 1.0, f64::INFINITY));
        }
        Ok(Self {
            lookback,
            rolling_window,
        })
    }

    /// Records consumed before the first row can be built
    pub fn warmup(&self) -> usize {
        self.lookback.max(self.rolling_window)
    }

    /// Length of every feature vector
    pub fn width(&self) -> usize {
        self.lookback + EXTRA_FEATURES
    }

    pub fn version(&self) -> u32 {
        FEATURE_SCHEMA_VERSION
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (1..=self.lookback).map(|i| format!("lag_{i}")).collect();
        names.push(format!("rolling_mean_{}", self.rolling_window));
        names.push(format!("rolling_std_{}", self.rolling_window));
        names.push("day_of_week".to_string());
        names.push("month".to_string());
        names.push("trend_index".to_string());
        names
    }
}

/// Fixed-width model input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: Vec<f64>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.features
    }
}

/// One supervised sample: features built from the past, and the value to predict
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub features: FeatureVector,
    pub target: f64,
}

/// Builds feature vectors for a fixed schema
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesFeaturizer {
    schema: FeatureSchema,
}

impl TimeSeriesFeaturizer {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    /// Lazily featurize a history; one row per record index `>= warmup`.
    pub fn featurize<'a>(
        &self,
        records: &'a [TimeSeriesRecord],
        target: TargetMetric,
    ) -> Result<Featurize<'a>> {
        let required = self.schema.warmup() + 1;
        if records.len() < required {
            return Err(ForesightError::InsufficientHistory {
                required,
                actual: records.len(),
            });
        }

        Ok(Featurize {
            records,
            values: records.iter().map(|r| r.value(target)).collect(),
            schema: self.schema,
            next: self.schema.warmup(),
        })
    }

    /// Features for the position just past the end of `values`, dated `next_date`.
    pub fn next_features(&self, values: &[f64], next_date: NaiveDate) -> Result<FeatureVector> {
        let required = self.schema.warmup();
        if values.len() < required {
            return Err(ForesightError::InsufficientHistory {
                required,
                actual: values.len(),
            });
        }
        Ok(build_features(&self.schema, values, values.len(), next_date))
    }
}

/// Iterator returned by [`TimeSeriesFeaturizer::featurize`]. Clone it to restart.
#[derive(Debug, Clone)]
pub struct Featurize<'a> {
    records: &'a [TimeSeriesRecord],
    values: Vec<f64>,
    schema: FeatureSchema,
    next: usize,
}

impl Iterator for Featurize<'_> {
    type Item = FeatureRow;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let record = self.records.get(index)?;
        self.next += 1;

        Some(FeatureRow {
            date: record.date,
            features: build_features(&self.schema, &self.values, index, record.date),
            target: self.values[index],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.records.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Featurize<'_> {}

/// Features for target position `index`, reading only `values[..index]`.
fn build_features(
    schema: &FeatureSchema,
    values: &[f64],
    index: usize,
    date: NaiveDate,
) -> FeatureVector {
    let mut features = Vec::with_capacity(schema.width());

    for lag in 1..=schema.lookback {
        features.push(values[index - lag]);
    }

    let (mean, std) = mean_and_sample_std(&values[index - schema.rolling_window..index]);
    features.push(mean);
    features.push(std);

    features.push(date.weekday().num_days_from_monday() as f64);
    features.push(date.month() as f64);
    features.push(index as f64);

    FeatureVector { features }
}

/// Mean and sample (n - 1) standard deviation; the deviation of a single value is 0.
pub fn mean_and_sample_std(window: &[f64]) -> (f64, f64) {
    if window.is_empty() {
        return (0.0, 0.0);
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    if window.len() < 2 {
        return (mean, 0.0);
    }
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}
