use chrono::Utc;
use quickshare_core::{AppError, Config};
use quickshare_db::UploadObjectRepositoryTrait;
use quickshare_storage::Storage;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::interval;

use crate::upload::{BLOB_STORE, CATALOG};

/// Outcome of one sweep over expired pending uploads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Removes pending uploads that expired without ever being confirmed.
#[derive(Clone)]
pub struct CleanupService {
    repository: Arc<dyn UploadObjectRepositoryTrait>,
    storage: Arc<dyn Storage>,
    period: Duration,
    /// Maximum records handled per sweep
    batch_size: i64,
    /// Ids whose deletion failed; retried only after fresh candidates
    failing: Arc<Mutex<HashSet<String>>>,
}

impl CleanupService {
    pub fn new(
        repository: Arc<dyn UploadObjectRepositoryTrait>,
        storage: Arc<dyn Storage>,
        period: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            repository,
            storage,
            period,
            batch_size,
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn from_config(
        config: &Config,
        repository: Arc<dyn UploadObjectRepositoryTrait>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self::new(
            repository,
            storage,
            Duration::from_secs(config.cleanup_interval_secs()),
            config.cleanup_batch_size(),
        )
    }

    /// Start the background sweep, one batch per period.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(self.period);

            loop {
                cleanup_interval.tick().await;

                tracing::info!("Starting scheduled cleanup of expired uploads");

                if let Err(e) = self.purge_expired_pending().await {
                    tracing::error!(error = %e, "Cleanup task failed");
                }
            }
        })
    }

    /// Delete one batch of expired pending uploads, blob first then catalog row.
    ///
    /// Per-record failures are logged and counted; only a failure to list
    /// candidates fails the sweep. Records that failed in an earlier sweep are
    /// fetched on top of the batch and handled after fresh ones, so they never
    /// crowd newer expired uploads out of the batch.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "expire_pending"))]
    pub async fn purge_expired_pending(&self) -> Result<CleanupReport, AppError> {
        let known_failing = self.failing_ids().len() as i64;
        let limit = self.batch_size.saturating_add(known_failing);

        let listed = self
            .repository
            .list_expired_pending(Utc::now(), limit)
            .await
            .map_err(|e| AppError::upstream(CATALOG, "list expired uploads", e))?;

        let expired = {
            let mut failing = self.failing_ids();
            if (listed.len() as i64) < limit {
                // Complete listing: forget ids that are no longer expired pending
                failing.retain(|id| listed.iter().any(|upload| &upload.id == id));
            }
            let (retries, fresh): (Vec<_>, Vec<_>) = listed
                .into_iter()
                .partition(|upload| failing.contains(&upload.id));
            let mut expired = fresh;
            expired.extend(retries);
            expired.truncate(self.batch_size.max(0) as usize);
            expired
        };

        let mut report = CleanupReport {
            scanned: expired.len(),
            ..CleanupReport::default()
        };

        for upload in expired {
            tracing::info!(
                upload_id = %upload.id,
                object_key = %upload.object_key,
                expires_at = %upload.expires_at,
                "Deleting expired upload"
            );

            if let Err(e) = self.storage.delete(&upload.object_key).await {
                tracing::error!(
                    error = %AppError::upstream(BLOB_STORE, "delete object", e),
                    object_key = %upload.object_key,
                    "Failed to delete from storage, keeping catalog entry"
                );
                self.failing_ids().insert(upload.id);
                report.failed += 1;
                continue;
            }

            match self.repository.delete(&upload.id).await {
                Ok(()) => {
                    tracing::debug!(upload_id = %upload.id, "Successfully deleted from catalog");
                    self.failing_ids().remove(&upload.id);
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        upload_id = %upload.id,
                        "Failed to delete from catalog"
                    );
                    self.failing_ids().insert(upload.id);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            "Cleanup completed"
        );

        Ok(report)
    }

    fn failing_ids(&self) -> MutexGuard<'_, HashSet<String>> {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use quickshare_core::{UploadObject, UploadStatus};
    use quickshare_db::{CatalogOperation, InMemoryUploadObjectRepository};
    use quickshare_storage::{
        MemoryStorage, ObjectMetadata, StorageBackend, StorageError, StorageResult,
    };

    /// Memory storage whose deletes always fail for one key
    struct StuckKeyStorage {
        inner: MemoryStorage,
        stuck_key: String,
    }

    #[async_trait::async_trait]
    impl Storage for StuckKeyStorage {
        async fn presigned_put_url(
            &self,
            storage_key: &str,
            expires_in: Duration,
        ) -> StorageResult<String> {
            self.inner.presigned_put_url(storage_key, expires_in).await
        }

        fn public_url(&self, storage_key: &str) -> String {
            self.inner.public_url(storage_key)
        }

        async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
            self.inner.exists(storage_key).await
        }

        async fn metadata(&self, storage_key: &str) -> StorageResult<ObjectMetadata> {
            self.inner.metadata(storage_key).await
        }

        async fn delete(&self, storage_key: &str) -> StorageResult<()> {
            if storage_key == self.stuck_key {
                return Err(StorageError::DeleteFailed("object locked".to_string()));
            }
            self.inner.delete(storage_key).await
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Memory
        }
    }

    fn record(id: &str, status: UploadStatus, hours_from_now: i64) -> UploadObject {
        UploadObject {
            id: id.to_string(),
            file_name: "report.pdf".to_string(),
            file_size: 2048,
            mime_type: "application/pdf".to_string(),
            object_key: format!("uploads/{}/report.pdf", id),
            status,
            expires_at: Utc::now() + ChronoDuration::hours(hours_from_now),
        }
    }

    fn cleanup(
        batch_size: i64,
    ) -> (CleanupService, InMemoryUploadObjectRepository, MemoryStorage) {
        let repository = InMemoryUploadObjectRepository::new();
        let storage = MemoryStorage::default();
        let service = CleanupService::new(
            Arc::new(repository.clone()),
            Arc::new(storage.clone()),
            Duration::from_secs(3600),
            batch_size,
        );
        (service, repository, storage)
    }

    #[tokio::test]
    async fn purges_only_expired_pending_uploads() {
        let (service, repository, storage) = cleanup(100);
        for upload in [
            record("stale", UploadStatus::Pending, -2),
            record("fresh", UploadStatus::Pending, 2),
            record("done", UploadStatus::Completed, -2),
        ] {
            storage.put_object(&upload.object_key, b"data".to_vec());
            repository.put_row(upload);
        }

        let report = service.purge_expired_pending().await.unwrap();

        assert_eq!(
            report,
            CleanupReport {
                scanned: 1,
                deleted: 1,
                failed: 0
            }
        );
        assert!(repository.row("stale").is_none());
        assert!(!storage.contains("uploads/stale/report.pdf"));
        assert!(repository.row("fresh").is_some());
        assert!(repository.row("done").is_some());
        assert!(storage.contains("uploads/done/report.pdf"));
    }

    #[tokio::test]
    async fn never_uploaded_blob_still_purges_catalog_entry() {
        let (service, repository, _) = cleanup(100);
        repository.put_row(record("abandoned", UploadStatus::Pending, -30));

        let report = service.purge_expired_pending().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_keeps_catalog_entry_and_continues() {
        let (service, repository, storage) = cleanup(100);
        repository.put_row(record("a", UploadStatus::Pending, -1));
        repository.put_row(record("b", UploadStatus::Pending, -2));
        storage.fail_deletes(true);

        let report = service.purge_expired_pending().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.deleted, 0);
        assert_eq!(repository.len(), 2);
    }

    #[tokio::test]
    async fn catalog_delete_failure_is_counted() {
        let (service, repository, _) = cleanup(100);
        repository.put_row(record("a", UploadStatus::Pending, -1));
        repository.fail(CatalogOperation::Delete);

        let report = service.purge_expired_pending().await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(repository.row("a").is_some());
    }

    #[tokio::test]
    async fn batch_size_bounds_one_sweep() {
        let (service, repository, _) = cleanup(2);
        for i in 0..5 {
            repository.put_row(record(&format!("u{}", i), UploadStatus::Pending, -(i + 1)));
        }

        let report = service.purge_expired_pending().await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(repository.len(), 3);
        // oldest first
        assert!(repository.row("u4").is_none());
        assert!(repository.row("u3").is_none());
    }

    #[tokio::test]
    async fn listing_failure_fails_the_sweep() {
        let (service, repository, _) = cleanup(100);
        repository.fail(CatalogOperation::List);

        let result = service.purge_expired_pending().await;
        assert!(matches!(result, Err(AppError::Upstream { .. })));
    }

    #[tokio::test]
    async fn persistently_failing_record_does_not_starve_newer_ones() {
        let repository = InMemoryUploadObjectRepository::new();
        let stuck = record("stuck", UploadStatus::Pending, -10);
        let storage = StuckKeyStorage {
            inner: MemoryStorage::default(),
            stuck_key: stuck.object_key.clone(),
        };
        repository.put_row(stuck);
        repository.put_row(record("other", UploadStatus::Pending, -1));
        let service = CleanupService::new(
            Arc::new(repository.clone()),
            Arc::new(storage),
            Duration::from_secs(3600),
            1,
        );

        let first = service.purge_expired_pending().await.unwrap();
        assert_eq!(first.failed, 1);
        assert!(repository.row("other").is_some());

        let second = service.purge_expired_pending().await.unwrap();
        assert_eq!(
            second,
            CleanupReport {
                scanned: 1,
                deleted: 1,
                failed: 0
            }
        );
        assert!(repository.row("other").is_none());
        assert!(repository.row("stuck").is_some());

        // With nothing fresh left, the failing record is retried
        let third = service.purge_expired_pending().await.unwrap();
        assert_eq!(third.scanned, 1);
        assert_eq!(third.failed, 1);
    }

    #[tokio::test]
    async fn failed_record_is_purged_once_storage_recovers() {
        let (service, repository, storage) = cleanup(1);
        repository.put_row(record("a", UploadStatus::Pending, -1));
        storage.fail_deletes(true);
        assert_eq!(service.purge_expired_pending().await.unwrap().failed, 1);

        storage.fail_deletes(false);
        let report = service.purge_expired_pending().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(repository.is_empty());
    }
}
