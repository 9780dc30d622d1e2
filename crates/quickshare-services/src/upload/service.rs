//! Upload lifecycle coordinator
//!
//! Drives an upload object through `pending -> completed` across two systems
//! that share no transaction: the catalog (source of lifecycle state) and the
//! blob store (source of the bytes). The coordinator never moves file data;
//! clients write through the presigned URL and read through the public URL.

use chrono::{Duration, Utc};
use quickshare_core::constants::{DEFAULT_RETENTION_HOURS, METADATA_SIZE_KEY, UPLOAD_URL_TTL};
use quickshare_core::{AppError, InitiatedUpload, UploadDraft, UploadObject, UploadStatus};
use quickshare_db::UploadObjectRepositoryTrait;
use quickshare_storage::{generate_object_key, Storage};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{BLOB_STORE, CATALOG};

#[derive(Clone)]
pub struct UploadService {
    repository: Arc<dyn UploadObjectRepositoryTrait>,
    storage: Arc<dyn Storage>,
}

/// Keep "unknown id" user-facing; anything else from the catalog is an upstream failure.
fn catalog_error(operation: &'static str, err: AppError) -> AppError {
    match err {
        AppError::NotFound(_) => err,
        other => AppError::upstream(CATALOG, operation, other),
    }
}

impl UploadService {
    pub fn new(
        repository: Arc<dyn UploadObjectRepositoryTrait>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Register a pending upload and mint a write URL for it.
    ///
    /// The URL is valid for 15 minutes regardless of the record's `expires_at`.
    /// If the catalog write fails after the URL was minted the whole operation
    /// fails; the unused URL simply lapses.
    #[tracing::instrument(skip(self, draft), fields(operation = "initiate_upload", file_name = %draft.file_name))]
    pub async fn initiate_upload(&self, draft: UploadDraft) -> Result<InitiatedUpload, AppError> {
        draft.validate()?;

        let now = Utc::now();
        if let Some(expires_at) = draft.expires_at {
            if expires_at <= now {
                return Err(AppError::InvalidInput(
                    "Expiry must be in the future".to_string(),
                ));
            }
        }

        let id = Uuid::new_v4().to_string();
        let object_key = generate_object_key(&id, &draft.file_name);
        let expires_at = draft
            .expires_at
            .unwrap_or_else(|| now + Duration::hours(DEFAULT_RETENTION_HOURS));

        let upload_url = self
            .storage
            .presigned_put_url(&object_key, UPLOAD_URL_TTL)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, object_key = %object_key, "Failed to generate upload URL");
                AppError::upstream(BLOB_STORE, "initiate upload", e)
            })?;

        let upload_object = UploadObject {
            id,
            file_name: draft.file_name,
            file_size: draft.file_size,
            mime_type: draft.mime_type,
            object_key,
            status: UploadStatus::Pending,
            expires_at,
        };

        let created = self.repository.create(&upload_object).await.map_err(|e| {
            tracing::error!(error = %e, upload_id = %upload_object.id, "Failed to register upload object");
            AppError::upstream(CATALOG, "initiate upload", e)
        })?;

        tracing::info!(
            upload_id = %created.id,
            object_key = %created.object_key,
            expires_at = %created.expires_at,
            "Upload initiated"
        );

        Ok(InitiatedUpload {
            id: created.id,
            upload_url,
            object_key: created.object_key,
            expires_at: created.expires_at,
        })
    }

    /// Mark an upload completed once its object is present in the blob store.
    ///
    /// Existence is re-checked on every call, so confirming a completed upload
    /// re-verifies it and rewrites the same terminal state. Store-reported size,
    /// when available, replaces the client-declared size.
    #[tracing::instrument(skip(self), fields(operation = "confirm_upload"))]
    pub async fn confirm_upload(&self, id: &str) -> Result<UploadObject, AppError> {
        let mut upload_object = self
            .repository
            .get(id)
            .await
            .map_err(|e| catalog_error("look up upload object", e))?;

        if !upload_object.is_completed() && upload_object.is_expired_at(Utc::now()) {
            return Err(AppError::UploadExpired(format!(
                "Upload {} expired at {}",
                id, upload_object.expires_at
            )));
        }

        let exists = self
            .storage
            .exists(&upload_object.object_key)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    upload_id = %id,
                    object_key = %upload_object.object_key,
                    "Failed to check object existence"
                );
                AppError::upstream(BLOB_STORE, "check object existence", e)
            })?;

        if !exists {
            return Err(AppError::ObjectNotInStorage(upload_object.object_key));
        }

        match self.storage.metadata(&upload_object.object_key).await {
            Ok(metadata) => {
                if let Some(size) = metadata.get(METADATA_SIZE_KEY) {
                    match size.parse::<i64>() {
                        Ok(size) if size >= 0 => upload_object.file_size = size,
                        _ => tracing::warn!(
                            upload_id = %id,
                            size = %size,
                            "Ignoring unparseable store-reported size"
                        ),
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    upload_id = %id,
                    "Failed to read object metadata, keeping declared size"
                );
            }
        }

        upload_object.status = UploadStatus::Completed;

        let updated = self
            .repository
            .update(id, &upload_object)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, upload_id = %id, "Failed to persist confirmation");
                catalog_error("update upload object", e)
            })?;

        tracing::info!(
            upload_id = %updated.id,
            file_size = updated.file_size,
            "Upload confirmed"
        );

        Ok(updated)
    }

    /// Catalog record for an upload, unchanged
    #[tracing::instrument(skip(self), fields(operation = "get_upload"))]
    pub async fn get_upload(&self, id: &str) -> Result<UploadObject, AppError> {
        self.repository
            .get(id)
            .await
            .map_err(|e| catalog_error("look up upload object", e))
    }

    /// Public URL for a completed, unexpired upload.
    ///
    /// Completion is checked before expiry.
    #[tracing::instrument(skip(self), fields(operation = "get_download_url"))]
    pub async fn get_download_url(&self, id: &str) -> Result<String, AppError> {
        let upload_object = self.get_upload(id).await?;

        if !upload_object.is_completed() {
            return Err(AppError::UploadNotCompleted(id.to_string()));
        }

        if upload_object.is_expired_at(Utc::now()) {
            return Err(AppError::UploadExpired(format!(
                "Upload {} expired at {}",
                id, upload_object.expires_at
            )));
        }

        Ok(self.storage.public_url(&upload_object.object_key))
    }

    /// Remove the blob, then the catalog row.
    ///
    /// A blob-store failure aborts before the catalog is touched, so the row
    /// never disappears while the blob remains.
    #[tracing::instrument(skip(self), fields(operation = "delete_upload_object"))]
    pub async fn delete_upload_object(&self, id: &str) -> Result<(), AppError> {
        let upload_object = self.get_upload(id).await?;

        self.storage
            .delete(&upload_object.object_key)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    upload_id = %id,
                    object_key = %upload_object.object_key,
                    "Failed to delete object from storage, keeping catalog entry"
                );
                AppError::upstream(BLOB_STORE, "delete object", e)
            })?;

        self.repository.delete(id).await.map_err(|e| {
            tracing::error!(error = %e, upload_id = %id, "Failed to delete catalog entry");
            catalog_error("delete upload object", e)
        })?;

        tracing::info!(upload_id = %id, object_key = %upload_object.object_key, "Upload deleted");
        Ok(())
    }
}
