//! QuickShare Core Library
//!
//! This crate provides the domain model, error types, configuration and
//! constants shared by every QuickShare component.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, QuickShareConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{InitiatedUpload, UploadDraft, UploadObject, UploadStatus};
pub use storage_types::StorageBackend;
