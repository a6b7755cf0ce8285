//! Object storage seam used by the asset archiver.

use async_trait::async_trait;

/// Metadata of an object that exists in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub key: String,
    pub size_bytes: Option<i64>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    /// Public URL of the stored object.
    pub url: String,
}

/// Errors from an object storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The source URL could not be downloaded.
    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// The storage backend rejected or failed the operation.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Durable object storage that can ingest a remote URL.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Copy the content at `source_url` into the object `key`.
    async fn put_object_from_url(
        &self,
        source_url: &str,
        key: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Return the object's metadata, or `None` when it does not exist.
    async fn head_object(&self, key: &str) -> Result<Option<ObjectHead>, StorageError>;

    /// Public URL an existing object is served from.
    fn public_url(&self, key: &str) -> String;
}
