//! Error types shared by the object model and the filesystem service.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A required identity or body was absent before the operation started.
    #[error("{operation} requires `{attribute}`")]
    MissingAttribute {
        operation: &'static str,
        attribute: &'static str,
    },

    /// Bytes written to the staging file disagree with the body's declared size.
    /// The target path is left untouched.
    #[error("write to {} failed: declared {declared} bytes, wrote {written}", .path.display())]
    WriteMismatch {
        path: PathBuf,
        declared: u64,
        written: u64,
    },

    /// A body declaring zero bytes is never promoted onto the target path.
    #[error("write to {} failed: body is empty", .path.display())]
    EmptyBody { path: PathBuf },

    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    pub(crate) fn missing(operation: &'static str, attribute: &'static str) -> Self {
        Self::MissingAttribute {
            operation,
            attribute,
        }
    }

    /// Underlying filesystem error kind, if this error came straight from the OS.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
