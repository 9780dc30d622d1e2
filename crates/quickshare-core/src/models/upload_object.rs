use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use validator::{Validate, ValidationError};

/// Lifecycle state of an upload object.
///
/// Expiry is never persisted as a state; it is derived from `expires_at` at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "upload_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Completed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Completed => "completed",
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(UploadStatus::Pending),
            "completed" => Ok(UploadStatus::Completed),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

/// One catalog row per upload attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UploadObject {
    pub id: String,
    pub file_name: String,
    /// Client-declared size, replaced by the store-reported size on confirmation
    pub file_size: i64,
    pub mime_type: String,
    pub object_key: String,
    pub status: UploadStatus,
    pub expires_at: DateTime<Utc>,
}

impl UploadObject {
    pub fn is_completed(&self) -> bool {
        self.status == UploadStatus::Completed
    }

    /// Expired once `now` is strictly past `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Client-declared metadata for a new upload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UploadDraft {
    /// Original filename, embedded verbatim in the object key
    #[validate(
        length(
            min = 1,
            max = 255,
            message = "File name must be between 1 and 255 characters"
        ),
        custom(function = "validate_file_name")
    )]
    pub file_name: String,
    /// File size in bytes
    #[validate(range(min = 0, message = "File size must not be negative"))]
    pub file_size: i64,
    /// Content type (MIME type)
    #[validate(length(
        min = 1,
        max = 255,
        message = "MIME type must be between 1 and 255 characters"
    ))]
    pub mime_type: String,
    /// Optional absolute expiry; defaults to creation time + 24h
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl UploadDraft {
    pub fn new(
        file_name: impl Into<String>,
        file_size: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            mime_type: mime_type.into(),
            expires_at: None,
        }
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

fn validate_file_name(file_name: &str) -> Result<(), ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::new("blank_file_name")
            .with_message("File name must not be blank".into()));
    }
    if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
        return Err(ValidationError::new("unsafe_file_name")
            .with_message("File name must not contain path separators or '..'".into()));
    }
    Ok(())
}

/// Result of a successful initiation
#[derive(Debug, Clone, Serialize)]
pub struct InitiatedUpload {
    /// Upload ID (used to confirm, download and delete)
    pub id: String,
    /// Presigned PUT URL, valid for 15 minutes from issuance
    pub upload_url: String,
    /// Blob-store key the client uploads to
    pub object_key: String,
    /// Download eligibility deadline of the record
    pub expires_at: DateTime<Utc>,
}
