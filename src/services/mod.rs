//! Filesystem services behind the object model.

pub mod content_type;
pub mod storage_service;
