//! Lifecycle constants shared across crates.

use std::time::Duration;

/// Validity window of a presigned upload URL, independent of the record's `expires_at`.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// Retention applied when a draft does not carry its own `expires_at`.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Prefix under which every upload object is stored.
pub const UPLOAD_KEY_PREFIX: &str = "uploads";

/// Blob metadata key carrying the stored object size in bytes.
pub const METADATA_SIZE_KEY: &str = "size";
