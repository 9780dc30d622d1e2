//! QuickShare Storage Library
//!
//! This crate provides the blob reference issuer: the `Storage` trait and its
//! S3 and in-memory implementations. No file bytes pass through it; it mints
//! presigned write URLs and public read URLs, checks existence, reads object
//! metadata and deletes objects.
//!
//! # Object key format
//!
//! Every upload is stored at `uploads/{id}/{file_name}`. Keys must not contain
//! `..` or a leading `/`. Key generation is centralized in the `keys` module so
//! all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-memory")]
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::generate_object_key;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
pub use quickshare_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectMetadata, Storage, StorageError, StorageResult};
