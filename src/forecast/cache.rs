use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::domain::{ModelKind, TargetMetric};
use crate::error::{ForesightError, Result};
use crate::ml::ModelHandle;

/// One cached model per (kind, target)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: ModelKind,
    pub target: TargetMetric,
}

impl CacheKey {
    pub fn new(kind: ModelKind, target: TargetMetric) -> Self {
        Self { kind, target }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.target)
    }
}

/// Shared cache of trained models.
///
/// Handles are immutable and shared through `Arc`, so readers keep using the
/// handle they fetched while a retrain swaps in a new one. At most one training
/// run per key is admitted at a time.
#[derive(Debug, Default)]
pub struct ModelCache {
    entries: RwLock<HashMap<CacheKey, Arc<ModelHandle>>>,
    training: Mutex<HashSet<CacheKey>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ModelHandle>> {
        self.entries.read().get(key).cloned()
    }

    /// Insert a handle, returning the one it replaced.
    pub fn put(&self, key: CacheKey, handle: Arc<ModelHandle>) -> Option<Arc<ModelHandle>> {
        self.entries.write().insert(key, handle)
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn is_training(&self, key: &CacheKey) -> bool {
        self.training.lock().contains(key)
    }

    /// Claim the training slot for `key`. The slot is released when the guard drops.
    pub fn begin_training(&self, key: CacheKey) -> Result<TrainingGuard<'_>> {
        let mut training = self.training.lock();
        if !training.insert(key) {
            return Err(ForesightError::TrainingInProgress {
                kind: key.kind,
                target: key.target,
            });
        }
        Ok(TrainingGuard { cache: self, key })
    }
}

/// Exclusive training slot for one key
#[derive(Debug)]
pub struct TrainingGuard<'a> {
    cache: &'a ModelCache,
    key: CacheKey,
}

impl TrainingGuard<'_> {
    pub fn key(&self) -> CacheKey {
        self.key
    }
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.cache.training.lock().remove(&self.key);
    }
}
