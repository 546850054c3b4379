//! Object storage for OCR uploads
//!
//! The service treats the store as append/delete-only: uploads are written
//! once under a unique key, read by the OCR provider through a document URL,
//! and eventually removed by the [`Janitor`](crate::Janitor). No transactional
//! guarantees beyond the backend's own are assumed.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use thiserror::Error;

mod memory;
mod s3;

pub use memory::MemoryBlobStore;
pub use s3::{S3BlobStore, S3Settings};

/// Errors raised by a [`BlobStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error reported by the storage backend
    #[error("Object store error: {0}")]
    Backend(#[from] object_store::Error),

    /// Listing produced an unusable entry
    #[error("Listing failed: {0}")]
    Listing(String),

    /// A single object could not be removed
    #[error("Failed to delete {key}: {message}")]
    Delete { key: String, message: String },

    /// The store could not be configured
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

/// One object as observed during a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

impl ObjectEntry {
    /// Age relative to `now`; objects stamped in the future have age zero
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.last_modified).max(chrono::Duration::zero())
    }
}

/// Bucket-scoped object storage
///
/// Implementations must be safe for concurrent use without external locking.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Recursive listing of the whole bucket.
    ///
    /// Errors are yielded per entry so callers can skip a bad object and keep
    /// going.
    fn list(&self) -> BoxStream<'_, Result<ObjectEntry, StoreError>>;

    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError>;

    /// Remove an object; removing a missing key succeeds
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// URL an external service can fetch the object from
    async fn document_url(&self, key: &str) -> Result<String, StoreError>;
}
