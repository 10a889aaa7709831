use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use shelfie_core::{ObjectPath, StorageBackend};
use tokio::fs;
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::traits::{ObjectDownload, ObjectStore, StorageError, StorageResult};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Local filesystem storage implementation
///
/// All objects live under a single root directory. Writes go to a temporary
/// file in the destination directory and are renamed into place only after
/// the full stream has been consumed and synced, so readers never observe a
/// truncated object and an aborted upload leaves nothing behind.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

/// Removes the temporary file unless the write completed and disarmed it.
/// Also runs when an in-flight `put` future is dropped mid-stream.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        TempFileGuard { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `root`.
    ///
    /// The directory is created if missing and canonicalized so later
    /// containment checks compare against a stable absolute path.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let root = fs::canonicalize(&root).await.map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize storage root: {}", e))
        })?;

        Ok(LocalStorage { root })
    }

    /// Validate a storage key and join it under the root.
    ///
    /// `ObjectPath` construction already guarantees a safe key; this check
    /// is applied again here so the backend stays safe even if handed a key
    /// built some other way.
    fn key_to_path(&self, path: &ObjectPath) -> StorageResult<PathBuf> {
        let key = path.key();
        if key.contains("..") || key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        if Path::new(&key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(
                "Storage key must be a plain relative path".to_string(),
            ));
        }

        Ok(self.root.join(key))
    }

    /// Ensure the destination directory exists and still resolves inside
    /// the root (a planted symlink would otherwise redirect the write).
    async fn verified_parent(&self, disk_path: &Path) -> StorageResult<PathBuf> {
        let parent = disk_path.parent().ok_or_else(|| {
            StorageError::InvalidKey("Storage key has no parent directory".to_string())
        })?;

        fs::create_dir_all(parent).await?;

        let canonical = fs::canonicalize(parent).await.map_err(|e| {
            StorageError::InvalidKey(format!("Failed to resolve destination directory: {}", e))
        })?;

        if !canonical.starts_with(&self.root) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage root".to_string(),
            ));
        }

        Ok(canonical)
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn put(
        &self,
        path: &ObjectPath,
        _content_type: &str,
        _content_length: Option<u64>,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let key = path.key();
        let disk_path = self.key_to_path(path)?;
        let parent = self.verified_parent(&disk_path).await?;

        let file_name = disk_path
            .file_name()
            .ok_or_else(|| StorageError::InvalidKey("Storage key has no file name".to_string()))?
            .to_owned();
        let final_path = parent.join(&file_name);
        let temp_path = parent.join(format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            Uuid::new_v4()
        ));

        let start = std::time::Instant::now();
        let mut guard = TempFileGuard::new(temp_path.clone());

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create temp file for {}: {}", key, e))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write stream for {}: {}", key, e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync {}: {}", key, e))
        })?;
        drop(file);

        fs::rename(&temp_path, &final_path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to finalize {}: {}", key, e))
        })?;
        guard.disarm();

        tracing::info!(
            path = %final_path.display(),
            key = %key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(bytes_copied)
    }

    async fn get(&self, path: &ObjectPath) -> StorageResult<ObjectDownload> {
        let key = path.key();
        let disk_path = self.key_to_path(path)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&disk_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key));
        }

        let canonical = fs::canonicalize(&disk_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to resolve {}: {}", key, e))
        })?;
        if !canonical.starts_with(&self.root) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage root".to_string(),
            ));
        }

        let file = fs::File::open(&canonical).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open {}: {}", key, e))
        })?;

        let content_length = file
            .metadata()
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("Failed to stat {}: {}", key, e)))?
            .len();

        let reader = tokio_util::io::ReaderStream::with_capacity(file, READ_CHUNK_BYTES);
        let stream = reader.map(|result| {
            result.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        });

        tracing::info!(
            key = %key,
            size_bytes = content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get streaming"
        );

        Ok(ObjectDownload {
            content_length,
            stream: Box::pin(stream),
        })
    }

    async fn exists(&self, path: &ObjectPath) -> StorageResult<bool> {
        let disk_path = self.key_to_path(path)?;
        Ok(fs::try_exists(&disk_path).await.unwrap_or(false))
    }

    fn backend_kind(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "backend-local"))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use shelfie_core::{Category, ImageFormat};
    use std::io::Cursor;
    use std::task::Poll;
    use tempfile::tempdir;

    fn reader_for(data: Vec<u8>) -> Pin<Box<dyn AsyncRead + Send + Unpin>> {
        Box::pin(Cursor::new(data))
    }

    async fn collect(download: ObjectDownload) -> Vec<u8> {
        let mut out = Vec::new();
        let mut stream = download.stream;
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    /// Yields a few bytes, then fails, simulating a client abort mid-upload.
    struct AbortingReader {
        yielded: bool,
    }

    impl AsyncRead for AbortingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if !self.yielded {
                self.yielded = true;
                buf.put_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
                Poll::Ready(Ok(()))
            } else {
                Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "client went away",
                )))
            }
        }
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let path = ObjectPath::generate(Category::Items, ImageFormat::Png);
        let data = b"png bytes go here".to_vec();

        storage
            .put(&path, "image/png", Some(data.len() as u64), reader_for(data.clone()))
            .await
            .unwrap();

        let download = storage.get(&path).await.unwrap();
        assert_eq!(download.content_length, data.len() as u64);
        assert_eq!(collect(download).await, data);
    }

    #[tokio::test]
    async fn get_missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let path = ObjectPath::generate(Category::Items, ImageFormat::Jpeg);
        let result = storage.get(&path).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn exists_reflects_stored_objects() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let path = ObjectPath::generate(Category::Items, ImageFormat::Webp);
        assert!(!storage.exists(&path).await.unwrap());

        storage
            .put(&path, "image/webp", None, reader_for(b"RIFFxxxxWEBP".to_vec()))
            .await
            .unwrap();
        assert!(storage.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn failed_upload_leaves_no_visible_or_temp_file() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let path = ObjectPath::generate(Category::Items, ImageFormat::Jpeg);
        let result = storage
            .put(
                &path,
                "image/jpeg",
                None,
                Box::pin(AbortingReader { yielded: false }),
            )
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));

        assert!(!storage.exists(&path).await.unwrap());

        // No temp debris either.
        let mut entries = fs::read_dir(dir.path().join("items")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overwriting_is_atomic_from_readers_view() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let path = ObjectPath::generate(Category::Items, ImageFormat::Png);
        storage
            .put(&path, "image/png", None, reader_for(b"first".to_vec()))
            .await
            .unwrap();

        // A failed second write must leave the prior object intact.
        let _ = storage
            .put(
                &path,
                "image/png",
                None,
                Box::pin(AbortingReader { yielded: false }),
            )
            .await;

        let download = storage.get(&path).await.unwrap();
        assert_eq!(collect(download).await, b"first");
    }
}
