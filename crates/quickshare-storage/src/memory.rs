//! In-memory blob store
//!
//! Used for development (`STORAGE_BACKEND=memory`) and as the blob-store test
//! double. Objects appear only through [`MemoryStorage::put_object`], which
//! stands in for a client uploading to the presigned URL.

use crate::keys::validate_key;
use crate::traits::{ObjectMetadata, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use quickshare_core::constants::METADATA_SIZE_KEY;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    metadata: ObjectMetadata,
}

/// Failure switches for exercising error paths.
#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    presign: bool,
    exists: bool,
    metadata: bool,
    delete: bool,
}

/// In-memory storage implementation
#[derive(Clone)]
pub struct MemoryStorage {
    base_url: String,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    faults: Arc<RwLock<Faults>>,
}

impl MemoryStorage {
    /// Create an empty store serving URLs under `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            faults: Arc::new(RwLock::new(Faults::default())),
        }
    }

    /// Store an object as if a client had uploaded it; size metadata is derived from the data.
    pub fn put_object(&self, storage_key: &str, data: impl Into<Bytes>) {
        let data = data.into();
        let mut metadata = ObjectMetadata::new();
        metadata.insert(METADATA_SIZE_KEY.to_string(), data.len().to_string());
        self.put_object_with_metadata(storage_key, data, metadata);
    }

    /// Store an object with exactly the given metadata.
    pub fn put_object_with_metadata(
        &self,
        storage_key: &str,
        data: impl Into<Bytes>,
        metadata: ObjectMetadata,
    ) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                storage_key.to_string(),
                StoredObject {
                    data: data.into(),
                    metadata,
                },
            );
    }

    /// Bytes stored under a key, if any
    pub fn object(&self, storage_key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(storage_key)
            .map(|object| object.data.clone())
    }

    pub fn contains(&self, storage_key: &str) -> bool {
        self.object(storage_key).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_presign(&self, fail: bool) {
        self.update_faults(|faults| faults.presign = fail);
    }

    pub fn fail_exists(&self, fail: bool) {
        self.update_faults(|faults| faults.exists = fail);
    }

    pub fn fail_metadata(&self, fail: bool) {
        self.update_faults(|faults| faults.metadata = fail);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.update_faults(|faults| faults.delete = fail);
    }

    fn update_faults(&self, apply: impl FnOnce(&mut Faults)) {
        apply(&mut self.faults.write().unwrap_or_else(PoisonError::into_inner));
    }

    fn faults(&self) -> Faults {
        *self.faults.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("memory://quickshare")
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        if self.faults().presign {
            return Err(StorageError::PresignFailed(
                "injected presign failure".to_string(),
            ));
        }

        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!(
            "{}/{}?method=PUT&expires={}",
            self.base_url.trim_end_matches('/'),
            storage_key,
            expires
        ))
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), storage_key)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        if self.faults().exists {
            return Err(StorageError::BackendError(
                "injected existence check failure".to_string(),
            ));
        }
        Ok(self.contains(storage_key))
    }

    async fn metadata(&self, storage_key: &str) -> StorageResult<ObjectMetadata> {
        validate_key(storage_key)?;
        if self.faults().metadata {
            return Err(StorageError::BackendError(
                "injected metadata failure".to_string(),
            ));
        }
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(storage_key)
            .map(|object| object.metadata.clone())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        if self.faults().delete {
            return Err(StorageError::DeleteFailed(
                "injected delete failure".to_string(),
            ));
        }

        let removed = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(storage_key)
            .is_some();

        tracing::debug!(key = %storage_key, removed, "Memory storage delete");
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
