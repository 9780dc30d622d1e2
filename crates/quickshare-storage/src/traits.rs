//! Storage abstraction trait
//!
//! This module defines the Storage trait that all blob-store backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Store-reported object metadata, keyed by lowercase field name.
///
/// Backends always report the object size under
/// [`quickshare_core::constants::METADATA_SIZE_KEY`].
pub type ObjectMetadata = HashMap<String, String>;

/// Blob reference issuer
///
/// Backends never move file bytes through the application; clients write with
/// the presigned URL and read through the public URL.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Generate a presigned PUT URL valid for `expires_in`.
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Stable public URL of an object. Reachability depends on bucket policy,
    /// not on any expiry tracked by the application.
    fn public_url(&self, storage_key: &str) -> String;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Fetch store-reported metadata for an existing object.
    async fn metadata(&self, storage_key: &str) -> StorageResult<ObjectMetadata>;

    /// Delete an object. Deleting an absent object succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
