//! Represents an object (file) stored in a bucket.

use crate::{
    errors::{StoreError, StoreResult},
    models::{body::Body, bucket::Bucket},
    services::content_type::content_type_for,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fs::Metadata, future::Future, mem, sync::OnceLock};

/// Where an object's payload currently lives.
#[derive(Debug)]
enum ObjectBody {
    /// Never saved and no body supplied; reads as empty.
    NotPersisted,
    /// Durable on disk, not fetched yet.
    Unloaded,
    /// Held in memory, either supplied by the caller or fetched from disk.
    Loaded(Body),
}

/// Serializable snapshot of an object's attributes.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub bucket: String,
    pub key: String,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

/// A single blob within a bucket.
///
/// `save` is the only way bytes reach disk and `destroy` the only way they
/// leave it. `last_modified` being set means durable content exists at the
/// object's path; `content_length` always reflects the bytes on disk.
#[derive(Debug)]
pub struct Object {
    /// Slash-delimited key, unique within the bucket.
    key: Option<String>,

    /// Owning bucket, needed to resolve the object's path.
    bucket: Option<Bucket>,

    /// Size in bytes as persisted.
    content_length: Option<u64>,

    /// Modification time of the persisted file.
    last_modified: Option<DateTime<Utc>>,

    body: ObjectBody,

    content_type: OnceLock<Option<&'static str>>,
}

impl Object {
    pub(crate) fn new(bucket: Bucket, key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            bucket: Some(bucket),
            content_length: None,
            last_modified: None,
            body: ObjectBody::NotPersisted,
            content_type: OnceLock::new(),
        }
    }

    /// An object with no bucket or key yet. Every disk operation rejects it
    /// until both are set.
    pub fn detached() -> Self {
        Self {
            key: None,
            bucket: None,
            content_length: None,
            last_modified: None,
            body: ObjectBody::NotPersisted,
            content_type: OnceLock::new(),
        }
    }

    pub(crate) fn persisted(
        bucket: Bucket,
        key: &str,
        meta: &Metadata,
        data: Option<Bytes>,
    ) -> Self {
        let mut object = Self::new(bucket, key);
        object.merge_stat(meta);
        object.body = match data {
            Some(bytes) => ObjectBody::Loaded(Body::Bytes(bytes)),
            None => ObjectBody::Unloaded,
        };
        object
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.set_body(body);
        self
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = ObjectBody::Loaded(body.into());
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
        self.content_type = OnceLock::new();
    }

    pub fn set_bucket(&mut self, bucket: Bucket) {
        self.bucket = Some(bucket);
    }

    /// Local files carry no ACL; the flag is accepted and returned unchanged.
    pub fn set_public(&mut self, public: bool) -> bool {
        public
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn bucket(&self) -> Option<&Bucket> {
        self.bucket.as_ref()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn is_persisted(&self) -> bool {
        self.last_modified.is_some()
    }

    /// MIME type inferred from the key's extension, computed once.
    pub fn content_type(&self) -> Option<&'static str> {
        *self
            .content_type
            .get_or_init(|| self.key.as_deref().and_then(content_type_for))
    }

    pub fn attributes(&self) -> ObjectAttributes {
        ObjectAttributes {
            bucket: self.bucket.as_ref().map(|b| b.key().to_string()).unwrap_or_default(),
            key: self.key.clone().unwrap_or_default(),
            content_length: self.content_length,
            last_modified: self.last_modified,
            content_type: self.content_type().map(str::to_string),
        }
    }

    /// The object's bytes.
    ///
    /// Empty for an object that was never saved. For a persisted object the
    /// content is fetched through the bucket on first access and cached.
    /// A supplied stream is drained once and replayed afterwards with its
    /// original declared length. If draining fails, a persisted object falls
    /// back to its on-disk content.
    pub async fn body(&mut self) -> StoreResult<Bytes> {
        match mem::replace(&mut self.body, ObjectBody::NotPersisted) {
            ObjectBody::NotPersisted => Ok(Bytes::new()),
            ObjectBody::Loaded(Body::Bytes(bytes)) => {
                self.body = ObjectBody::Loaded(Body::Bytes(bytes.clone()));
                Ok(bytes)
            }
            ObjectBody::Loaded(stream) => match stream.buffer().await {
                Ok((bytes, replay)) => {
                    self.body = ObjectBody::Loaded(replay);
                    Ok(bytes)
                }
                Err(err) => {
                    if self.is_persisted() {
                        self.body = ObjectBody::Unloaded;
                    }
                    Err(StoreError::Io(err))
                }
            },
            ObjectBody::Unloaded => {
                self.body = ObjectBody::Unloaded;
                let (bucket, key) = self.owned_identity("read")?;
                let bytes = fetch_body(&bucket, &key).await?;
                self.body = ObjectBody::Loaded(Body::Bytes(bytes.clone()));
                Ok(bytes)
            }
        }
    }

    /// Durably write the body to disk and refresh size and timestamp from the
    /// written file.
    ///
    /// A stream body is consumed by the write; afterwards it is re-read from
    /// disk on demand.
    pub async fn save(&mut self) -> StoreResult<()> {
        if matches!(self.body, ObjectBody::NotPersisted) {
            return Err(StoreError::missing("save", "body"));
        }
        let (storage, path) = {
            let (bucket, key) = self.identity("save")?;
            (bucket.storage().clone(), bucket.storage().path_to(bucket.key(), key))
        };

        if matches!(self.body, ObjectBody::Unloaded) {
            self.body().await?;
        }
        let body = match mem::replace(&mut self.body, ObjectBody::NotPersisted) {
            ObjectBody::Loaded(body) => body,
            _ => return Err(StoreError::missing("save", "body")),
        };
        let retained = body.as_bytes().cloned();

        let result = storage.write_object(&path, body).await;

        self.body = match retained {
            Some(bytes) => ObjectBody::Loaded(Body::Bytes(bytes)),
            None if result.is_ok() || self.is_persisted() => ObjectBody::Unloaded,
            None => ObjectBody::NotPersisted,
        };
        self.merge_stat(&result?);
        Ok(())
    }

    /// Remove the object's file and any directories it leaves empty, up to
    /// but excluding the bucket directory.
    ///
    /// The identity is captured up front, so the returned future does not
    /// borrow the object.
    pub fn destroy(&self) -> impl Future<Output = StoreResult<bool>> + Send + use<> {
        let identity = self.owned_identity("destroy");
        async move {
            let (bucket, key) = identity?;
            bucket.storage().remove_object(bucket.key(), &key).await?;
            Ok(true)
        }
    }

    /// Public URL, or `None` when the storage has no endpoint configured.
    pub fn public_url(&self) -> StoreResult<Option<String>> {
        let (bucket, key) = self.identity("public_url")?;
        Ok(bucket.storage().public_url(bucket.key(), key))
    }

    /// Copy the persisted content to `target_key` in `target_bucket_key` and
    /// return the new object as read back from disk.
    pub fn copy(
        &self,
        target_bucket_key: &str,
        target_key: &str,
    ) -> impl Future<Output = StoreResult<Object>> + Send + use<> {
        let identity = self.owned_identity("copy");
        let target_bucket_key = target_bucket_key.to_string();
        let target_key = target_key.to_string();
        async move {
            let (bucket, key) = identity?;
            let storage = bucket.storage();
            storage
                .copy_object(bucket.key(), &key, &target_bucket_key, &target_key)
                .await?;
            let copied = storage
                .bucket(target_bucket_key.as_str())
                .get(&target_key)
                .await?;
            copied.ok_or(StoreError::ObjectNotFound {
                bucket: target_bucket_key,
                key: target_key,
            })
        }
    }

    fn identity(&self, operation: &'static str) -> StoreResult<(&Bucket, &str)> {
        let bucket = self
            .bucket
            .as_ref()
            .ok_or_else(|| StoreError::missing(operation, "bucket"))?;
        let key = self
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StoreError::missing(operation, "key"))?;
        Ok((bucket, key))
    }

    fn owned_identity(&self, operation: &'static str) -> StoreResult<(Bucket, String)> {
        let (bucket, key) = self.identity(operation)?;
        Ok((bucket.clone(), key.to_string()))
    }

    fn merge_stat(&mut self, meta: &Metadata) {
        self.content_length = Some(meta.len());
        self.last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
    }
}

/// Re-read persisted content through the owning bucket.
async fn fetch_body(bucket: &Bucket, key: &str) -> StoreResult<Bytes> {
    let mut fetched = bucket
        .get(key)
        .await?
        .ok_or_else(|| StoreError::ObjectNotFound {
            bucket: bucket.key().to_string(),
            key: key.to_string(),
        })?;
    match mem::replace(&mut fetched.body, ObjectBody::NotPersisted) {
        ObjectBody::Loaded(body) => Ok(body.into_bytes().await?),
        _ => Ok(Bytes::new()),
    }
}
