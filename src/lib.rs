//! Local filesystem emulation of bucket/object blob storage.
//!
//! Buckets are directories beneath a storage root and objects are files
//! within them, so code written against an object-store interface can run
//! against plain disk. Writes are staged, verified, fsynced and atomically
//! renamed; deletes prune empty directories up to the bucket.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{StoreError, StoreResult};
pub use models::{
    body::Body,
    bucket::Bucket,
    object::{Object, ObjectAttributes},
};
pub use services::storage_service::LocalStorage;
