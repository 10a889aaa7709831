//! Storage abstraction trait
//!
//! This module defines the [`ObjectStore`] trait that both storage backends
//! implement. The gateway works against this trait only; backend identity
//! never leaks past it.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use shelfie_core::{ObjectPath, StorageBackend};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Transient backend error: {0}")]
    Transient(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Bounded-memory byte stream produced by a backend read.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// A stored object being read back: its size and a chunked byte stream.
/// No operation requires the full object resident in memory.
pub struct ObjectDownload {
    pub content_length: u64,
    pub stream: ByteStream,
}

/// Storage abstraction trait
///
/// Both backends (local filesystem, remote sidecar) implement this trait.
/// Writes consume a reader until EOF; a failed or cancelled write must
/// never leave a partially-visible object at the final path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist an object at its path, consuming the reader until EOF.
    /// Returns the number of bytes written.
    ///
    /// `content_length` is a hint when the caller knows the exact size;
    /// backends must not trust it over the bytes actually read.
    async fn put(
        &self,
        path: &ObjectPath,
        content_type: &str,
        content_length: Option<u64>,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64>;

    /// Read an object back as a byte stream.
    async fn get(&self, path: &ObjectPath) -> StorageResult<ObjectDownload>;

    /// Check whether an object exists at the path.
    async fn exists(&self, path: &ObjectPath) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_kind(&self) -> StorageBackend;
}
