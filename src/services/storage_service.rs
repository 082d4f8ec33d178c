//! src/services/storage_service.rs
//!
//! LocalStorage — blob storage emulated on an ordinary directory tree.
//! Objects live at `root/{bucket}/{key}` where `key` may contain `/` to form
//! nested directories. No metadata files are kept: directory existence and the
//! object file itself are the only persisted state.
//!
//! Writes stage into a sibling temp file, verify the byte count, fsync and
//! rename onto the target. Concurrent writers to the same key never produce a
//! torn file; the last rename wins. Deletes prune now-empty parent directories
//! up to, but never including, the bucket directory. The prune walk is not
//! synchronized with concurrent saves under the same prefix.

use crate::{
    errors::{StoreError, StoreResult},
    models::{body::Body, bucket::Bucket},
};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::{
    ffi::OsString,
    fs::Metadata,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, warn};

/// Characters escaped in public URLs. Path separators and sub-delimiters
/// survive so keys keep their path shape.
const URL_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Filesystem-backed blob storage rooted at a single directory.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    /// Base directory under which every bucket directory lives.
    root: PathBuf,

    /// Public base URL; `None` disables public URLs.
    endpoint: Option<String>,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, endpoint: Option<String>) -> Self {
        Self {
            root: root.into(),
            endpoint,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Handle for the bucket named `key`. Nothing is created on disk.
    pub fn bucket(&self, key: impl Into<String>) -> Bucket {
        Bucket::new(key, self.clone())
    }

    /// Directory holding every object of `bucket_key`.
    pub fn bucket_root(&self, bucket_key: &str) -> PathBuf {
        push_segments(self.root.clone(), bucket_key)
    }

    /// Absolute path of `object_key` inside `bucket_key`.
    ///
    /// Keys are split on `/` and appended segment by segment, so a leading
    /// slash never escapes the root and repeated slashes collapse. `.` is
    /// dropped and `..` is resolved within the key, so the result always lies
    /// under the bucket directory.
    pub fn path_to(&self, bucket_key: &str, object_key: &str) -> PathBuf {
        push_segments(self.bucket_root(bucket_key), object_key)
    }

    /// Public URL for an object, or `None` when no endpoint is configured.
    pub fn public_url(&self, bucket_key: &str, object_key: &str) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?;
        Some(format!(
            "{}/{}/{}",
            endpoint.trim_end_matches('/'),
            utf8_percent_encode(bucket_key, URL_UNSAFE),
            utf8_percent_encode(object_key, URL_UNSAFE)
        ))
    }

    /// Durably write `body` to `path`.
    ///
    /// - Creates any missing parent directories.
    /// - Streams the body into `{path}.tmp.{pid}.{nanos}.{seq}` and fsyncs it.
    /// - Promotes the temp file with a single rename only when the bytes
    ///   written equal the body's declared length and that length is non-zero.
    /// - Removes the temp file afterwards whatever the outcome.
    ///
    /// Returns the metadata of the file that was promoted.
    pub async fn write_object(&self, path: &Path, body: Body) -> StoreResult<Metadata> {
        let parent = path.parent().ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::InvalidInput,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(parent).await?;

        let tmp_path = temp_path_for(path);
        debug!("staging {} via {}", path.display(), tmp_path.display());
        let result = stage_and_promote(&tmp_path, path, body).await;

        // Cleanup: after a successful rename there is nothing left to remove.
        discard_temp(&tmp_path).await;

        result
    }

    /// Metadata of the object file, or `None` when no regular file exists there.
    pub async fn stat_object(&self, path: &Path) -> StoreResult<Option<Metadata>> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta)),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    /// Read an object's full contents together with its metadata.
    pub async fn read_object(&self, path: &Path) -> StoreResult<Option<(Bytes, Metadata)>> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Ok(None);
        }
        let mut buf = Vec::with_capacity(meta.len() as usize);
        file.read_to_end(&mut buf).await?;
        Ok(Some((Bytes::from(buf), meta)))
    }

    /// Copy a stored object to another bucket/key through the same staged write.
    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StoreResult<Metadata> {
        let src_path = self.path_to(src_bucket, src_key);
        let file = match File::open(&src_path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound {
                    bucket: src_bucket.to_string(),
                    key: src_key.to_string(),
                });
            }
            Err(err) => return Err(StoreError::Io(err)),
        };
        let body = Body::from_file(file).await?;
        let dst_path = self.path_to(dst_bucket, dst_key);
        self.write_object(&dst_path, body).await
    }

    /// Delete an object's file, then prune empty directories left behind.
    ///
    /// A missing file is not an error. Failures to remove the file itself
    /// propagate; pruning failures never do.
    pub async fn remove_object(&self, bucket_key: &str, object_key: &str) -> StoreResult<()> {
        let file_path = self.path_to(bucket_key, object_key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed object file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(bucket_key);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(())
    }

    /// Walk upward from `start`, removing directories that are empty when
    /// inspected. Stops at `stop`, which is never removed, and never leaves
    /// the `stop` subtree. Only live filesystem state is consulted.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        for dir in start.ancestors() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            if dir == stop || !dir.starts_with(stop) {
                break;
            }
            match is_empty_dir(dir).await {
                Ok(true) => match fs::remove_dir(dir).await {
                    Ok(_) => debug!("pruned empty directory {}", dir.display()),
                    Err(err) => debug!("failed to prune directory {}: {}", dir.display(), err),
                },
                Ok(false) => debug!("keeping non-empty directory {}", dir.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => debug!("failed to inspect directory {}: {}", dir.display(), err),
            }
        }
    }
}

async fn stage_and_promote(tmp_path: &Path, path: &Path, body: Body) -> StoreResult<Metadata> {
    let declared = body.declared_len();
    let mut file = File::create(tmp_path).await?;

    let written = match body {
        Body::Bytes(bytes) => {
            file.write_all(&bytes).await?;
            bytes.len() as u64
        }
        Body::Stream { mut stream, .. } => {
            let mut copied: u64 = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                copied += chunk.len() as u64;
            }
            copied
        }
    };
    file.flush().await?;

    if written != declared {
        warn!(
            "write to {} failed: declared {} bytes, wrote {}",
            path.display(),
            declared,
            written
        );
        return Err(StoreError::WriteMismatch {
            path: path.to_path_buf(),
            declared,
            written,
        });
    }

    file.sync_data().await?;
    let meta = file.metadata().await?;
    drop(file);

    if declared == 0 {
        return Err(StoreError::EmptyBody {
            path: path.to_path_buf(),
        });
    }

    fs::rename(tmp_path, path).await?;
    debug!("promoted {} ({} bytes)", path.display(), meta.len());
    Ok(meta)
}

/// Best-effort temp-file removal. The result is discarded: an absent file is
/// the normal case after promotion and other failures do not affect the write.
async fn discard_temp(tmp_path: &Path) {
    match fs::remove_file(tmp_path).await {
        Ok(_) => debug!("removed temp file {}", tmp_path.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => debug!("failed to remove temp file {}: {}", tmp_path.display(), err),
    }
}

/// Sibling staging path, unique per process and instant. The sequence number
/// separates writers in one process that read the same clock value.
fn temp_path_for(path: &Path) -> PathBuf {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".tmp.{}.{}.{}", std::process::id(), nanos, seq));
    PathBuf::from(name)
}

/// Append `/`-separated segments of `key` to `base`. Empty and `.` segments
/// are dropped; `..` undoes the previous segment but never climbs above `base`.
fn push_segments(mut base: PathBuf, key: &str) -> PathBuf {
    let mut depth = 0usize;
    for segment in key.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if depth > 0 {
                    base.pop();
                    depth -= 1;
                }
            }
            segment => {
                base.push(segment);
                depth += 1;
            }
        }
    }
    base
}

async fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}
