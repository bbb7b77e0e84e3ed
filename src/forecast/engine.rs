use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{CacheKey, ModelCache, FEATURE_SCHEMA_VERSION};
use crate::config::Config;
use crate::domain::{
    history_fingerprint, validate_history, ForecastResult, ModelKind, TargetMetric,
    TimeSeriesRecord,
};
use crate::error::{ensure_range, ForesightError, Result};
use crate::ml::{
    save_handle, Forecaster, ModelHandle, ModelStore, SequenceForecaster, TreeForecaster,
    BLOB_FORMAT_VERSION,
};

/// Longest forecast the service will produce, in days
pub const MAX_HORIZON: usize = 30;

/// Entry point for forecasting: validates input, reuses cached or persisted
/// models when the history is unchanged, and trains otherwise.
pub struct ForecastService {
    cache: Arc<ModelCache>,
    store: Option<Arc<dyn ModelStore>>,
    tree: TreeForecaster,
    sequence: SequenceForecaster,
}

impl ForecastService {
    pub fn new(config: &Config, cache: Arc<ModelCache>) -> Result<Self> {
        Ok(Self {
            cache,
            store: None,
            tree: TreeForecaster::from_config(config)?,
            sequence: SequenceForecaster::from_config(config),
        })
    }

    pub fn with_forecasters(
        cache: Arc<ModelCache>,
        tree: TreeForecaster,
        sequence: SequenceForecaster,
    ) -> Self {
        Self {
            cache,
            store: None,
            tree,
            sequence,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ModelStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    fn forecaster(&self, kind: ModelKind) -> &dyn Forecaster {
        match kind {
            ModelKind::Tree => &self.tree,
            ModelKind::Sequence => &self.sequence,
        }
    }

    /// Forecast `horizon` days past the end of `records`.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn forecast(
        &self,
        records: &[TimeSeriesRecord],
        target: TargetMetric,
        kind: ModelKind,
        horizon: usize,
    ) -> Result<ForecastResult> {
        ensure_range("horizon", horizon as f64, 1.0, MAX_HORIZON as f64)?;
        validate_history(records)?;

        let handle = self.ensure_trained(records, target, kind)?;
        self.forecaster(kind).predict(&handle, records, horizon)
    }

    /// Forecast with whatever model is cached, without checking it against the history.
    ///
    /// The trend feature is a record's position in `records`, so `records`
    /// must start on the same day as the history the model was trained on.
    /// Appending newer days is fine; dropping older ones shifts the trend.
    pub fn predict_cached(
        &self,
        records: &[TimeSeriesRecord],
        target: TargetMetric,
        kind: ModelKind,
        horizon: usize,
    ) -> Result<ForecastResult> {
        ensure_range("horizon", horizon as f64, 1.0, MAX_HORIZON as f64)?;
        validate_history(records)?;

        let handle = self
            .cache
            .get(&CacheKey::new(kind, target))
            .ok_or(ForesightError::NotTrained { kind, target })?;
        self.forecaster(kind).predict(&handle, records, horizon)
    }

    /// Train unconditionally and replace the cached model. On failure the
    /// previous model stays in place.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn train(
        &self,
        records: &[TimeSeriesRecord],
        target: TargetMetric,
        kind: ModelKind,
    ) -> Result<Arc<ModelHandle>> {
        validate_history(records)?;
        let key = CacheKey::new(kind, target);
        let _slot = self.cache.begin_training(key)?;

        let handle = match self.forecaster(kind).train(records, target) {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                warn!(%key, error = %e, "training failed, keeping previous model");
                return Err(e);
            }
        };

        self.cache.put(key, Arc::clone(&handle));
        if let Some(store) = &self.store {
            save_handle(store.as_ref(), &handle)?;
        }
        info!(%key, model_id = %handle.metadata().model_id, "model replaced");
        Ok(handle)
    }

    /// Drop the cached and persisted model for a key.
    pub fn invalidate(&self, kind: ModelKind, target: TargetMetric) -> Result<()> {
        let key = CacheKey::new(kind, target);
        self.cache.invalidate(&key);
        if let Some(store) = &self.store {
            store.remove(&key.to_string())?;
        }
        Ok(())
    }

    /// Drop every cached model. Persisted blobs are kept and revalidated on next use.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Load a persisted model if it is compatible and was trained on `fingerprint`.
    pub fn load_persisted(&self, key: CacheKey, fingerprint: u64) -> Result<Option<ModelHandle>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let blob_key = key.to_string();
        let Some((bytes, meta)) = store.get(&blob_key)? else {
            return Ok(None);
        };

        if meta.format_version != BLOB_FORMAT_VERSION
            || meta.feature_schema_version != FEATURE_SCHEMA_VERSION
        {
            debug!(%key, "persisted model has an incompatible layout");
            return Ok(None);
        }
        if meta.history_fingerprint != fingerprint {
            debug!(%key, "persisted model was trained on another history");
            return Ok(None);
        }

        let handle = ModelHandle::from_bytes(&blob_key, &bytes)?;
        if handle.kind() != key.kind || handle.target() != key.target {
            return Err(ForesightError::serialization(
                blob_key,
                format!("blob holds a {}-{} model", handle.kind(), handle.target()),
            ));
        }
        Ok(Some(handle))
    }

    fn ensure_trained(
        &self,
        records: &[TimeSeriesRecord],
        target: TargetMetric,
        kind: ModelKind,
    ) -> Result<Arc<ModelHandle>> {
        let key = CacheKey::new(kind, target);
        let fingerprint = history_fingerprint(records, target);

        if let Some(handle) = self.cache.get(&key) {
            if handle.metadata().history_fingerprint == fingerprint {
                debug!(%key, "cache hit");
                return Ok(handle);
            }
            debug!(%key, "history changed since last training");
        }

        match self.load_persisted(key, fingerprint) {
            Ok(Some(handle)) => {
                info!(%key, "loaded persisted model");
                let handle = Arc::new(handle);
                self.cache.put(key, Arc::clone(&handle));
                return Ok(handle);
            }
            Ok(None) => {}
            Err(e) => warn!(%key, error = %e, "persisted model unusable, retraining"),
        }

        self.train(records, target, kind)
    }
}
