use chrono::{DateTime, Utc};
use quickshare_core::{AppError, UploadObject, UploadStatus};
use sqlx::PgPool;

/// Trait for upload object catalog operations
///
/// The catalog never assigns identifiers; `id` and `object_key` arrive on the
/// record from the coordinator. Absent rows surface as `AppError::NotFound`.
#[async_trait::async_trait]
pub trait UploadObjectRepositoryTrait: Send + Sync {
    /// Insert a new record. Duplicate `id` or `object_key` is an `AppError::Conflict`.
    async fn create(&self, upload_object: &UploadObject) -> Result<UploadObject, AppError>;

    async fn get(&self, id: &str) -> Result<UploadObject, AppError>;

    /// Persist the mutable fields of a record.
    ///
    /// `id` and `object_key` are never rewritten, and a completed record is
    /// never moved back to pending (`AppError::Conflict`).
    async fn update(
        &self,
        id: &str,
        upload_object: &UploadObject,
    ) -> Result<UploadObject, AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;

    /// Pending records whose `expires_at` is before `before`, oldest first.
    async fn list_expired_pending(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<UploadObject>, AppError>;
}

/// PostgreSQL-backed catalog
#[derive(Clone)]
pub struct PostgresUploadObjectRepository {
    pool: PgPool,
}

impl PostgresUploadObjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(err: sqlx::Error, id: &str) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return AppError::Conflict(format!("Upload object already exists: {}", id));
        }
    }
    AppError::Database(err)
}

#[async_trait::async_trait]
impl UploadObjectRepositoryTrait for PostgresUploadObjectRepository {
    #[tracing::instrument(skip(self, upload_object), fields(upload_id = %upload_object.id))]
    async fn create(&self, upload_object: &UploadObject) -> Result<UploadObject, AppError> {
        let row = sqlx::query_as::<_, UploadObject>(
            r#"
            INSERT INTO upload_objects (
                id, file_name, file_size, mime_type, object_key, status, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, file_name, file_size, mime_type, object_key, status, expires_at
            "#,
        )
        .bind(&upload_object.id)
        .bind(&upload_object.file_name)
        .bind(upload_object.file_size)
        .bind(&upload_object.mime_type)
        .bind(&upload_object.object_key)
        .bind(upload_object.status)
        .bind(upload_object.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &upload_object.id))?;

        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(upload_id = %id))]
    async fn get(&self, id: &str) -> Result<UploadObject, AppError> {
        sqlx::query_as::<_, UploadObject>(
            r#"
            SELECT id, file_name, file_size, mime_type, object_key, status, expires_at
            FROM upload_objects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Upload object not found: {}", id)))
    }

    #[tracing::instrument(skip(self, upload_object), fields(upload_id = %id))]
    async fn update(
        &self,
        id: &str,
        upload_object: &UploadObject,
    ) -> Result<UploadObject, AppError> {
        let row = sqlx::query_as::<_, UploadObject>(
            r#"
            UPDATE upload_objects
            SET file_name = $2, file_size = $3, mime_type = $4, status = $5,
                expires_at = $6, updated_at = NOW()
            WHERE id = $1
              AND (status = 'pending' OR $5 = 'completed'::upload_status)
            RETURNING id, file_name, file_size, mime_type, object_key, status, expires_at
            "#,
        )
        .bind(id)
        .bind(&upload_object.file_name)
        .bind(upload_object.file_size)
        .bind(&upload_object.mime_type)
        .bind(upload_object.status)
        .bind(upload_object.expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, id))?;

        match row {
            Some(row) => Ok(row),
            None => {
                // Distinguish a missing row from a refused backwards transition.
                self.get(id).await?;
                Err(AppError::Conflict(format!(
                    "Upload object {} is completed and cannot return to pending",
                    id
                )))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(upload_id = %id))]
    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM upload_objects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Upload object not found: {}",
                id
            )));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_expired_pending(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<UploadObject>, AppError> {
        let rows = sqlx::query_as::<_, UploadObject>(
            r#"
            SELECT id, file_name, file_size, mime_type, object_key, status, expires_at
            FROM upload_objects
            WHERE status = $1 AND expires_at < $2
            ORDER BY expires_at
            LIMIT $3
            "#,
        )
        .bind(UploadStatus::Pending)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
