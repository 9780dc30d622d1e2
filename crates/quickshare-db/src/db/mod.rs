//! Database repositories for data access layer
//
// Upload object catalog
pub mod upload_object;
//
// In-memory catalog
#[cfg(feature = "memory")]
pub mod memory;
//
// Pool setup and migrations
pub mod setup;

#[cfg(feature = "memory")]
pub use memory::InMemoryUploadObjectRepository;
pub use upload_object::{
    PostgresUploadObjectRepository, PostgresUploadObjectRepository as UploadObjectRepository,
    UploadObjectRepositoryTrait,
};
