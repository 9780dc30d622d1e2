//! Shared key generation for storage backends.
//!
//! Key format: `uploads/{id}/{file_name}`.

use crate::traits::{StorageError, StorageResult};
use quickshare_core::constants::UPLOAD_KEY_PREFIX;

/// Generate the object key for an upload id and its file name.
pub fn generate_object_key(id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", UPLOAD_KEY_PREFIX, id, file_name)
}

/// Reject keys that could escape the upload prefix.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_embeds_id_and_file_name() {
        assert_eq!(
            generate_object_key("0b7f", "report.pdf"),
            "uploads/0b7f/report.pdf"
        );
    }

    #[test]
    fn traversal_and_absolute_keys_are_rejected() {
        assert!(matches!(
            validate_key("../etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            validate_key("/etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(validate_key(""), Err(StorageError::InvalidKey(_))));
        assert!(validate_key("uploads/abc/report.pdf").is_ok());
    }
}
