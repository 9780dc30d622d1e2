//! Shared fixtures for coordinator integration tests

#![allow(dead_code)]

use chrono::{Duration, Utc};
use quickshare_db::InMemoryUploadObjectRepository;
use quickshare_services::UploadService;
use quickshare_storage::MemoryStorage;
use std::sync::Arc;

pub struct TestContext {
    pub service: UploadService,
    pub catalog: InMemoryUploadObjectRepository,
    pub blobs: MemoryStorage,
}

pub fn setup() -> TestContext {
    let catalog = InMemoryUploadObjectRepository::new();
    let blobs = MemoryStorage::new("https://files.example.test");
    let service = UploadService::new(Arc::new(catalog.clone()), Arc::new(blobs.clone()));
    TestContext {
        service,
        catalog,
        blobs,
    }
}

impl TestContext {
    /// Stand-in for the client's PUT to the presigned URL
    pub fn upload_bytes(&self, object_key: &str, len: usize) {
        self.blobs.put_object(object_key, vec![7u8; len]);
    }

    /// Move a record's expiry into the past, as if its retention window elapsed
    pub fn expire(&self, id: &str) {
        let mut row = self.catalog.row(id).expect("record exists");
        row.expires_at = Utc::now() - Duration::seconds(1);
        self.catalog.put_row(row);
    }
}
