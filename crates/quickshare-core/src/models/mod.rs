//! Data models for the application

pub mod upload_object;

pub use upload_object::*;
