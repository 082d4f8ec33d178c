//! Object payloads: in-memory bytes or a chunked stream with a declared length.

use bytes::{Bytes, BytesMut};
use futures::{
    Stream, StreamExt,
    stream::{self, BoxStream},
};
use std::{fmt, io};
use tokio::{fs::File, io::AsyncRead};
use tokio_util::io::ReaderStream;

/// Content supplied for a write, or loaded from disk.
pub enum Body {
    /// Fully buffered payload; its declared length is its actual length.
    Bytes(Bytes),

    /// Payload copied chunk by chunk. `declared_len` is what the source
    /// claims and is checked against the bytes actually transferred.
    Stream {
        stream: BoxStream<'static, io::Result<Bytes>>,
        declared_len: u64,
    },
}

impl Body {
    /// Stream an open file, declaring its current on-disk size.
    pub async fn from_file(file: File) -> io::Result<Self> {
        let declared_len = file.metadata().await?.len();
        Ok(Self::from_reader(file, declared_len))
    }

    pub fn from_reader<R>(reader: R, declared_len: u64) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::from_stream(ReaderStream::new(reader), declared_len)
    }

    pub fn from_stream<S>(stream: S, declared_len: u64) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream {
            stream: stream.boxed(),
            declared_len,
        }
    }

    /// Size the body claims to have, independent of what can actually be read.
    pub fn declared_len(&self) -> u64 {
        match self {
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::Stream { declared_len, .. } => *declared_len,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Stream { .. } => None,
        }
    }

    /// Drain the body into memory.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Stream { mut stream, .. } => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Drain the body into memory and return the bytes together with a body
    /// that replays them. The replay keeps the original declared length, so a
    /// short or long source still fails the size check when it is written.
    pub async fn buffer(self) -> io::Result<(Bytes, Body)> {
        let declared_len = self.declared_len();
        let bytes = self.into_bytes().await?;
        let replay = if bytes.len() as u64 == declared_len {
            Self::Bytes(bytes.clone())
        } else {
            Self::from_stream(stream::iter([Ok(bytes.clone())]), declared_len)
        };
        Ok((bytes, replay))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream { declared_len, .. } => f
                .debug_struct("Stream")
                .field("declared_len", declared_len)
                .finish_non_exhaustive(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::Bytes(Bytes::from(s))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(s: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_declare_their_length() {
        assert_eq!(Body::from("my contents").declared_len(), 11);
        assert_eq!(Body::from(Vec::<u8>::new()).declared_len(), 0);
    }

    #[tokio::test]
    async fn stream_declares_caller_length() {
        let body = Body::from_reader(&b"my contents"[..], 1234);
        assert_eq!(body.declared_len(), 1234);
        assert!(body.as_bytes().is_none());
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from("my contents"));
    }

    #[tokio::test]
    async fn stream_chunks_are_concatenated() {
        let chunks = vec![Ok(Bytes::from("hello ")), Ok(Bytes::from("world"))];
        let body = Body::from_stream(stream::iter(chunks), 11);
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn stream_errors_surface() {
        let chunks = vec![
            Ok(Bytes::from("partial")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "source closed")),
        ];
        let body = Body::from_stream(stream::iter(chunks), 20);
        let err = body.into_bytes().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn buffer_keeps_declared_length_on_mismatch() {
        let body = Body::from_reader(&b"my contents"[..], 1234);
        let (bytes, replay) = body.buffer().await.unwrap();

        assert_eq!(bytes, Bytes::from("my contents"));
        assert_eq!(replay.declared_len(), 1234);
        assert!(replay.as_bytes().is_none());
        assert_eq!(replay.into_bytes().await.unwrap(), Bytes::from("my contents"));
    }

    #[tokio::test]
    async fn buffer_of_matching_stream_becomes_bytes() {
        let chunks = vec![Ok(Bytes::from("hello ")), Ok(Bytes::from("world"))];
        let (bytes, replay) = Body::from_stream(stream::iter(chunks), 11)
            .buffer()
            .await
            .unwrap();

        assert_eq!(bytes, Bytes::from("hello world"));
        assert_eq!(replay.as_bytes(), Some(&bytes));
    }

    #[tokio::test]
    async fn file_declares_on_disk_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"tempfile").unwrap();

        let body = Body::from_file(File::open(&path).await.unwrap()).await.unwrap();

        assert_eq!(body.declared_len(), 8);
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from("tempfile"));
    }
}
