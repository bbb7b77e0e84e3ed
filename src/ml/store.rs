//! Model Persistence
//!
//! Trained models are stored as opaque bincode blobs keyed `"{kind}-{target}"`,
//! each with a small metadata envelope that is checked before the blob is used.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ModelHandle;
use crate::domain::{ModelKind, TargetMetric};
use crate::error::{ForesightError, Result};

/// Bumped whenever the blob layout changes
pub const BLOB_FORMAT_VERSION: u32 = 1;

/// Metadata stored next to every blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub format_version: u32,
    pub model_kind: ModelKind,
    pub target_metric: TargetMetric,
    pub trained_at: DateTime<Utc>,
    pub feature_schema_version: u32,
    pub history_fingerprint: u64,
}

impl BlobMetadata {
    pub fn for_handle(handle: &ModelHandle) -> Self {
        let meta = handle.metadata();
        Self {
            format_version: BLOB_FORMAT_VERSION,
            model_kind: meta.model_kind,
            target_metric: meta.target_metric,
            trained_at: meta.trained_at,
            feature_schema_version: meta.feature_schema_version,
            history_fingerprint: meta.history_fingerprint,
        }
    }
}

/// Key-value blob store for trained models
pub trait ModelStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8], metadata: &BlobMetadata) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<(Vec<u8>, BlobMetadata)>>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Serialize a handle into the store under its own key.
pub fn save_handle(store: &dyn ModelStore, handle: &ModelHandle) -> Result<()> {
    let bytes = handle.to_bytes()?;
    store.put(&handle.blob_key(), &bytes, &BlobMetadata::for_handle(handle))
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    blobs: RwLock<HashMap<String, (Vec<u8>, BlobMetadata)>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl ModelStore for InMemoryModelStore {
    fn put(&self, key: &str, bytes: &[u8], metadata: &BlobMetadata) -> Result<()> {
        self.blobs
            .write()
            .insert(key.to_string(), (bytes.to_vec(), metadata.clone()));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<(Vec<u8>, BlobMetadata)>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.blobs.write().remove(key);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredBlob {
    metadata: BlobMetadata,
    bytes: Vec<u8>,
}

/// One file per key under a directory. Writes go to a temporary file that is
/// renamed into place, so readers never see a partial blob.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.model"))
    }
}

impl ModelStore for FileModelStore {
    fn put(&self, key: &str, bytes: &[u8], metadata: &BlobMetadata) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let blob = StoredBlob {
            metadata: metadata.clone(),
            bytes: bytes.to_vec(),
        };
        let encoded = bincode::serialize(&blob).map_err(|e| ForesightError::serialization(key, e))?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.model.tmp"));
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &path)?;

        debug!(key, path = %path.display(), "model blob written");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<(Vec<u8>, BlobMetadata)>> {
        let raw = match fs::read(self.path_for(key)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob: StoredBlob =
            bincode::deserialize(&raw).map_err(|e| ForesightError::serialization(key, e))?;
        Ok(Some((blob.bytes, blob.metadata)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
