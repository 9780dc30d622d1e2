//! In-memory catalog
//!
//! Satisfies the same contract as the PostgreSQL repository, including the
//! uniqueness and forward-only status rules, so the coordinator can be
//! exercised without a database.

use chrono::{DateTime, Utc};
use quickshare_core::{AppError, UploadObject, UploadStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::upload_object::UploadObjectRepositoryTrait;

/// Catalog operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogOperation {
    Create,
    Get,
    Update,
    Delete,
    List,
}

#[derive(Default)]
struct State {
    rows: HashMap<String, UploadObject>,
    failing: Vec<CatalogOperation>,
}

#[derive(Clone, Default)]
pub struct InMemoryUploadObjectRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryUploadObjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `operation` fail with a database error
    pub fn fail(&self, operation: CatalogOperation) {
        let mut state = self.lock();
        if !state.failing.contains(&operation) {
            state.failing.push(operation);
        }
    }

    pub fn recover(&self, operation: CatalogOperation) {
        self.lock().failing.retain(|op| *op != operation);
    }

    /// Snapshot of a row, bypassing failure injection
    pub fn row(&self, id: &str) -> Option<UploadObject> {
        self.lock().rows.get(id).cloned()
    }

    /// Overwrite a row directly, bypassing contract checks
    pub fn put_row(&self, upload_object: UploadObject) {
        self.lock()
            .rows
            .insert(upload_object.id.clone(), upload_object);
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(state: &State, operation: CatalogOperation) -> Result<(), AppError> {
        if state.failing.contains(&operation) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Upload object not found: {}", id))
}

#[async_trait::async_trait]
impl UploadObjectRepositoryTrait for InMemoryUploadObjectRepository {
    async fn create(&self, upload_object: &UploadObject) -> Result<UploadObject, AppError> {
        let mut state = self.lock();
        Self::check(&state, CatalogOperation::Create)?;

        let duplicate = state.rows.contains_key(&upload_object.id)
            || state
                .rows
                .values()
                .any(|row| row.object_key == upload_object.object_key);
        if duplicate {
            return Err(AppError::Conflict(format!(
                "Upload object already exists: {}",
                upload_object.id
            )));
        }

        state
            .rows
            .insert(upload_object.id.clone(), upload_object.clone());
        Ok(upload_object.clone())
    }

    async fn get(&self, id: &str) -> Result<UploadObject, AppError> {
        let state = self.lock();
        Self::check(&state, CatalogOperation::Get)?;
        state.rows.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn update(
        &self,
        id: &str,
        upload_object: &UploadObject,
    ) -> Result<UploadObject, AppError> {
        let mut state = self.lock();
        Self::check(&state, CatalogOperation::Update)?;

        let row = state.rows.get_mut(id).ok_or_else(|| not_found(id))?;
        if row.status == UploadStatus::Completed && upload_object.status == UploadStatus::Pending
        {
            return Err(AppError::Conflict(format!(
                "Upload object {} is completed and cannot return to pending",
                id
            )));
        }

        row.file_name = upload_object.file_name.clone();
        row.file_size = upload_object.file_size;
        row.mime_type = upload_object.mime_type.clone();
        row.status = upload_object.status;
        row.expires_at = upload_object.expires_at;
        Ok(row.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut state = self.lock();
        Self::check(&state, CatalogOperation::Delete)?;
        state.rows.remove(id).map(|_| ()).ok_or_else(|| not_found(id))
    }

    async fn list_expired_pending(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<UploadObject>, AppError> {
        let state = self.lock();
        Self::check(&state, CatalogOperation::List)?;

        let mut rows: Vec<UploadObject> = state
            .rows
            .values()
            .filter(|row| row.status == UploadStatus::Pending && row.expires_at < before)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.expires_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, status: UploadStatus, expires_at: DateTime<Utc>) -> UploadObject {
        UploadObject {
            id: id.to_string(),
            file_name: "report.pdf".to_string(),
            file_size: 2048,
            mime_type: "application/pdf".to_string(),
            object_key: format!("uploads/{}/report.pdf", id),
            status,
            expires_at,
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_the_record() {
        let repo = InMemoryUploadObjectRepository::new();
        let object = record("a", UploadStatus::Pending, Utc::now());

        repo.create(&object).await.unwrap();
        assert_eq!(repo.get("a").await.unwrap(), object);
    }

    #[tokio::test]
    async fn get_missing_record_is_not_found() {
        let repo = InMemoryUploadObjectRepository::new();
        assert!(matches!(repo.get("missing").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_id_or_object_key_conflicts() {
        let repo = InMemoryUploadObjectRepository::new();
        let object = record("a", UploadStatus::Pending, Utc::now());
        repo.create(&object).await.unwrap();

        assert!(matches!(
            repo.create(&object).await,
            Err(AppError::Conflict(_))
        ));

        let mut same_key = record("b", UploadStatus::Pending, Utc::now());
        same_key.object_key = object.object_key.clone();
        assert!(matches!(
            repo.create(&same_key).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_never_rewrites_object_key() {
        let repo = InMemoryUploadObjectRepository::new();
        let object = record("a", UploadStatus::Pending, Utc::now());
        repo.create(&object).await.unwrap();

        let mut changed = object.clone();
        changed.object_key = "uploads/other/key".to_string();
        changed.status = UploadStatus::Completed;
        let updated = repo.update("a", &changed).await.unwrap();

        assert_eq!(updated.object_key, object.object_key);
        assert_eq!(updated.status, UploadStatus::Completed);
    }

    #[tokio::test]
    async fn completed_record_cannot_return_to_pending() {
        let repo = InMemoryUploadObjectRepository::new();
        let object = record("a", UploadStatus::Completed, Utc::now());
        repo.create(&object).await.unwrap();

        let mut reverted = object.clone();
        reverted.status = UploadStatus::Pending;
        assert!(matches!(
            repo.update("a", &reverted).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(repo.row("a").unwrap().status, UploadStatus::Completed);
    }

    #[tokio::test]
    async fn delete_missing_record_is_not_found() {
        let repo = InMemoryUploadObjectRepository::new();
        assert!(matches!(
            repo.delete("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn injected_failures_surface_as_database_errors() {
        let repo = InMemoryUploadObjectRepository::new();
        let object = record("a", UploadStatus::Pending, Utc::now());
        repo.create(&object).await.unwrap();

        repo.fail(CatalogOperation::Delete);
        assert!(matches!(repo.delete("a").await, Err(AppError::Database(_))));
        assert!(repo.row("a").is_some());

        repo.recover(CatalogOperation::Delete);
        repo.delete("a").await.unwrap();
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn list_expired_pending_filters_and_orders() {
        let repo = InMemoryUploadObjectRepository::new();
        let now = Utc::now();
        repo.create(&record("old", UploadStatus::Pending, now - Duration::hours(3)))
            .await
            .unwrap();
        repo.create(&record("older", UploadStatus::Pending, now - Duration::hours(5)))
            .await
            .unwrap();
        repo.create(&record("done", UploadStatus::Completed, now - Duration::hours(5)))
            .await
            .unwrap();
        repo.create(&record("fresh", UploadStatus::Pending, now + Duration::hours(1)))
            .await
            .unwrap();

        let expired = repo.list_expired_pending(now, 10).await.unwrap();
        let ids: Vec<&str> = expired.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["older", "old"]);

        let limited = repo.list_expired_pending(now, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "older");
    }
}
