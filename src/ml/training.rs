//! Training Pipeline Helpers
//!
//! Supervised datasets with chronological splitting, and the patience-based
//! early-stopping tracker used by the sequence model.

use serde::{Deserialize, Serialize};

use crate::error::{ForesightError, Result};
use crate::forecast::FeatureRow;

/// Supervised samples kept in chronological order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDataset<X> {
    pub inputs: Vec<X>,
    pub targets: Vec<f64>,
}

impl<X: Clone> TrainingDataset<X> {
    pub fn new(inputs: Vec<X>, targets: Vec<f64>) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(ForesightError::Model(format!(
                "input and target count mismatch: {} inputs, {} targets",
                inputs.len(),
                targets.len()
            )));
        }
        Ok(Self { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Split off the most recent `validation_split` share as a validation set.
    /// The training part always keeps at least one sample; the validation part
    /// may be empty for very short datasets.
    pub fn split(&self, validation_split: f64) -> Result<(Self, Self)> {
        if !(0.0..1.0).contains(&validation_split) {
            return Err(ForesightError::out_of_range(
                "validation_split",
                validation_split,
                0.0,
                1.0,
            ));
        }

        let split_idx = ((self.len() as f64) * (1.0 - validation_split)).floor() as usize;
        let split_idx = split_idx.clamp(1usize.min(self.len()), self.len());

        let train = Self {
            inputs: self.inputs[..split_idx].to_vec(),
            targets: self.targets[..split_idx].to_vec(),
        };
        let val = Self {
            inputs: self.inputs[split_idx..].to_vec(),
            targets: self.targets[split_idx..].to_vec(),
        };

        Ok((train, val))
    }
}

impl TrainingDataset<Vec<f64>> {
    /// Dataset of engineered feature rows
    pub fn from_rows(rows: impl IntoIterator<Item = FeatureRow>) -> Self {
        let (inputs, targets) = rows
            .into_iter()
            .map(|row| (row.features.features, row.target))
            .unzip();
        Self { inputs, targets }
    }

    /// Sliding windows of `window` values, each labelled with the value that follows it.
    pub fn from_windows(values: &[f64], window: usize) -> Self {
        let (inputs, targets) = values
            .windows(window + 1)
            .map(|w| (w[..window].to_vec(), w[window]))
            .unzip();
        Self { inputs, targets }
    }
}

/// Outcome of feeding one epoch's validation loss to [`EarlyStopping`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochOutcome {
    Improved,
    NoImprovement,
    Stop,
}

/// Stops training once the validation loss has not improved for `patience` epochs
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best_loss: f64,
    best_epoch: usize,
    stale_epochs: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience: patience.max(1),
            min_delta: 1e-9,
            best_loss: f64::INFINITY,
            best_epoch: 0,
            stale_epochs: 0,
        }
    }

    pub fn observe(&mut self, epoch: usize, loss: f64) -> EpochOutcome {
        if loss < self.best_loss - self.min_delta {
            self.best_loss = loss;
            self.best_epoch = epoch;
            self.stale_epochs = 0;
            return EpochOutcome::Improved;
        }

        self.stale_epochs += 1;
        if self.stale_epochs >= self.patience {
            EpochOutcome::Stop
        } else {
            EpochOutcome::NoImprovement
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }
}

/// Mean squared error
pub fn mse(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / predictions.len() as f64
}
