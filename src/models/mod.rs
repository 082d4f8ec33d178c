//! Core data models for the local blob store.
//!
//! A [`bucket::Bucket`] is a directory under the storage root; an
//! [`object::Object`] is a file inside it whose key may span nested
//! directories. [`body::Body`] is the payload handed to a write.

pub mod body;
pub mod bucket;
pub mod object;
