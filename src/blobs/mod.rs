//! Image storage behind posts and avatars.

mod local;
pub mod tickets;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::AppResult;

pub use self::local::LocalBlobStore;
pub use self::tickets::UploadPolicy;

/// A stored object read back from a [`BlobStore`].
#[derive(Debug, Clone)]
pub struct BlobObject {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Storage for uploaded images, addressed by storage id.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their storage id.
    async fn put(&self, owner_id: &str, content_type: &str, bytes: Bytes) -> AppResult<String>;

    /// Public URL for a storage id, or None if nothing is stored under it.
    async fn url(&self, storage_id: &str) -> AppResult<Option<String>>;

    /// User id that uploaded the object, or None if nothing is stored under it.
    async fn owner(&self, storage_id: &str) -> AppResult<Option<String>>;

    async fn open(&self, storage_id: &str) -> AppResult<Option<BlobObject>>;

    /// Remove a stored object. Returns false if it did not exist.
    async fn delete(&self, storage_id: &str) -> AppResult<bool>;
}
