//! QuickShare Services Layer
//!
//! This crate hosts the upload lifecycle coordinator (`UploadService`) and the
//! expired-upload sweeper (`CleanupService`). Both depend only on the catalog
//! and blob-store capability traits, so any backend pair can be plugged in.
//! Keep orchestration here; keep transport and process wiring in the callers.

#[cfg(feature = "cleanup")]
pub mod cleanup;
pub mod upload;

#[cfg(feature = "cleanup")]
pub use cleanup::{CleanupReport, CleanupService};
pub use upload::UploadService;

pub use quickshare_db::UploadObjectRepositoryTrait;
pub use quickshare_storage::{create_storage, Storage, StorageBackend, StorageError};
