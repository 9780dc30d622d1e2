//! QuickShare Database Layer
//!
//! This crate provides the object catalog: the `UploadObjectRepositoryTrait`
//! contract, its PostgreSQL implementation and an in-memory implementation,
//! plus connection pool setup and migrations.

pub mod db;

pub use db::setup::{run_migrations, setup_database};
#[cfg(feature = "memory")]
pub use db::memory::{CatalogOperation, InMemoryUploadObjectRepository};
pub use db::{PostgresUploadObjectRepository, UploadObjectRepository, UploadObjectRepositoryTrait};
