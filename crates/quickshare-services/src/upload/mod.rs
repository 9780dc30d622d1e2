//! Upload lifecycle coordination

mod service;

pub use service::UploadService;

/// Collaborator names used when wrapping upstream failures
pub(crate) const CATALOG: &str = "catalog";
pub(crate) const BLOB_STORE: &str = "blob store";
