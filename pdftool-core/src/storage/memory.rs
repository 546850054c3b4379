use super::{BlobStore, ObjectEntry, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Bytes,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    broken_listings: HashSet<String>,
    failing_deletes: HashSet<String>,
}

/// In-memory bucket with controllable timestamps and injectable failures
#[derive(Debug)]
pub struct MemoryBlobStore {
    bucket: String,
    inner: Mutex<Inner>,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object with an explicit last-modified time
    pub fn insert_at(&self, key: impl Into<String>, bytes: impl Into<Bytes>, last_modified: DateTime<Utc>) {
        self.lock().objects.insert(
            key.into(),
            StoredObject {
                bytes: bytes.into(),
                last_modified,
            },
        );
    }

    /// Make the listing yield an error in place of this key
    pub fn break_listing_for(&self, key: impl Into<String>) {
        self.lock().broken_listings.insert(key.into());
    }

    /// Make deletes of this key fail
    pub fn fail_delete_for(&self, key: impl Into<String>) {
        self.lock().failing_deletes.insert(key.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.lock().objects.get(key).map(|object| object.bytes.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list(&self) -> BoxStream<'_, Result<ObjectEntry, StoreError>> {
        let inner = self.lock();
        let entries: Vec<_> = inner
            .objects
            .iter()
            .map(|(key, object)| {
                if inner.broken_listings.contains(key) {
                    Err(StoreError::Listing(format!("unreadable metadata for {key}")))
                } else {
                    Ok(ObjectEntry {
                        key: key.clone(),
                        last_modified: object.last_modified,
                        size: object.bytes.len() as u64,
                    })
                }
            })
            .collect();
        stream::iter(entries).boxed()
    }

    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.insert_at(key, bytes, Utc::now());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failing_deletes.contains(key) {
            return Err(StoreError::Delete {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        inner.objects.remove(key);
        Ok(())
    }

    async fn document_url(&self, key: &str) -> Result<String, StoreError> {
        Ok(format!("memory://{}/{key}", self.bucket))
    }
}
