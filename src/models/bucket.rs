//! Represents a bucket — a top-level directory beneath the storage root.

use crate::{
    errors::StoreResult,
    models::object::Object,
    services::storage_service::LocalStorage,
};
use std::path::PathBuf;

/// A named container of objects.
///
/// Buckets carry no state of their own beyond their key; listing and
/// creation are handled elsewhere. Objects hold a clone of their bucket
/// so they can resolve paths and reach the storage service.
#[derive(Clone, Debug)]
pub struct Bucket {
    key: String,
    storage: LocalStorage,
}

impl Bucket {
    pub(crate) fn new(key: impl Into<String>, storage: LocalStorage) -> Self {
        Self {
            key: key.into(),
            storage,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// The bucket's directory. Deletes never remove it.
    pub fn path(&self) -> PathBuf {
        self.storage.bucket_root(&self.key)
    }

    /// A new, unsaved object in this bucket.
    pub fn new_object(&self, key: impl Into<String>) -> Object {
        Object::new(self.clone(), key)
    }

    /// Object attributes from disk; the body is fetched on first access.
    pub async fn head(&self, key: &str) -> StoreResult<Option<Object>> {
        let path = self.storage.path_to(&self.key, key);
        Ok(self
            .storage
            .stat_object(&path)
            .await?
            .map(|meta| Object::persisted(self.clone(), key, &meta, None)))
    }

    /// Object attributes and body from disk.
    pub async fn get(&self, key: &str) -> StoreResult<Option<Object>> {
        let path = self.storage.path_to(&self.key, key);
        Ok(self
            .storage
            .read_object(&path)
            .await?
            .map(|(data, meta)| Object::persisted(self.clone(), key, &meta, Some(data))))
    }
}
