use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use shelfie_core::{ObjectPath, StorageBackend};
use tokio::io::{AsyncRead, AsyncSeekExt};

use crate::credentials::CredentialBroker;
use crate::retry::{is_transient, with_retry};
use crate::traits::{ObjectDownload, ObjectStore, StorageError, StorageResult};

/// Remote sidecar storage implementation
///
/// Objects are persisted in a cloud blob store reached over its REST API
/// (`{endpoint}/{bucket}/{key}`), authenticated with short-lived bearer
/// credentials issued by the local sidecar. Uploads are spooled to an
/// anonymous temp file before the first attempt so the request body can be
/// replayed across retries, the blob store gets an exact Content-Length,
/// and an aborted upload never leaves partial remote state.
pub struct SidecarStorage {
    http: reqwest::Client,
    endpoint: String,
    bucket: String,
    broker: CredentialBroker,
}

impl SidecarStorage {
    /// Create a new SidecarStorage instance.
    ///
    /// # Arguments
    /// * `endpoint` - Blob store API endpoint (e.g., "http://localhost:8334")
    /// * `bucket` - Bucket name within the blob store
    /// * `credential_url` - The sidecar's credential-issuing endpoint
    pub fn new(endpoint: String, bucket: String, credential_url: String) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let broker = CredentialBroker::new(http.clone(), credential_url);

        Ok(SidecarStorage {
            http,
            endpoint,
            bucket,
            broker,
        })
    }

    /// Startup check: the credential broker must be reachable before the
    /// backend is handed out. Failure here is fatal configuration, never a
    /// request-time retry.
    pub async fn validate(&self) -> StorageResult<()> {
        self.broker.validate().await
    }

    fn object_url(&self, path: &ObjectPath) -> String {
        let encoded_key = path
            .key()
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            encoded_key
        )
    }
}

fn classify_send_error(err: reqwest::Error, what: &str) -> StorageError {
    if is_transient(&err) {
        StorageError::Transient(format!("{} failed: {}", what, err))
    } else {
        StorageError::UploadFailed(format!("{} failed: {}", what, err))
    }
}

#[async_trait]
impl ObjectStore for SidecarStorage {
    async fn put(
        &self,
        path: &ObjectPath,
        content_type: &str,
        _content_length: Option<u64>,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let key = path.key();
        let url = self.object_url(path);
        let start = std::time::Instant::now();

        // Spool the stream locally first; the upload body must be
        // replayable per attempt and the blob store wants an exact length.
        let spool = tempfile::tempfile().map_err(StorageError::IoError)?;
        let mut spool = tokio::fs::File::from_std(spool);
        let spooled_bytes = tokio::io::copy(&mut reader, &mut spool)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to spool upload: {}", e)))?;

        let spool = &spool;
        let url_ref = &url;
        let key_ref = key.as_str();
        with_retry("sidecar_put", || async move {
            let token = self.broker.token().await?;

            let mut attempt_file = spool.try_clone().await.map_err(StorageError::IoError)?;
            attempt_file
                .seek(std::io::SeekFrom::Start(0))
                .await
                .map_err(StorageError::IoError)?;
            let body = reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(attempt_file));

            let response = self
                .http
                .put(url_ref)
                .bearer_auth(&token)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .header(reqwest::header::CONTENT_LENGTH, spooled_bytes)
                .body(body)
                .send()
                .await
                .map_err(|e| classify_send_error(e, "Upload"))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else if status.is_server_error() {
                Err(StorageError::Transient(format!(
                    "Blob store returned {} for {}",
                    status, key_ref
                )))
            } else {
                Err(StorageError::UploadFailed(format!(
                    "Blob store returned {} for {}",
                    status, key_ref
                )))
            }
        })
        .await?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = spooled_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Sidecar storage put successful"
        );

        Ok(spooled_bytes)
    }

    async fn get(&self, path: &ObjectPath) -> StorageResult<ObjectDownload> {
        let key = path.key();
        let url = self.object_url(path);
        let start = std::time::Instant::now();

        let url_ref = &url;
        let key_ref = key.as_str();
        let response = with_retry("sidecar_get", || async move {
            let token = self.broker.token().await?;
            let response = self
                .http
                .get(url_ref)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| {
                    if is_transient(&e) {
                        StorageError::Transient(format!("Download failed: {}", e))
                    } else {
                        StorageError::DownloadFailed(format!("Download failed: {}", e))
                    }
                })?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                Err(StorageError::NotFound(key_ref.to_string()))
            } else if status.is_server_error() {
                Err(StorageError::Transient(format!(
                    "Blob store returned {} for {}",
                    status, key_ref
                )))
            } else if !status.is_success() {
                Err(StorageError::DownloadFailed(format!(
                    "Blob store returned {} for {}",
                    status, key_ref
                )))
            } else {
                Ok(response)
            }
        })
        .await?;

        let content_length = response.content_length().unwrap_or_default();

        let bucket = self.bucket.clone();
        let stream = response.bytes_stream().map(move |result| {
            result.map_err(|e| {
                tracing::error!(bucket = %bucket, "Sidecar stream download error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Sidecar storage get streaming"
        );

        Ok(ObjectDownload {
            content_length,
            stream: Box::pin(stream),
        })
    }

    async fn exists(&self, path: &ObjectPath) -> StorageResult<bool> {
        let key = path.key();
        let url = self.object_url(path);

        let url_ref = &url;
        let key_ref = key.as_str();
        with_retry("sidecar_exists", || async move {
            let token = self.broker.token().await?;
            let response = self
                .http
                .head(url_ref)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| {
                    if is_transient(&e) {
                        StorageError::Transient(format!("Existence check failed: {}", e))
                    } else {
                        StorageError::DownloadFailed(format!("Existence check failed: {}", e))
                    }
                })?;

            let status = response.status();
            if status.is_success() {
                Ok(true)
            } else if status == reqwest::StatusCode::NOT_FOUND {
                Ok(false)
            } else if status.is_server_error() {
                Err(StorageError::Transient(format!(
                    "Blob store returned {} for {}",
                    status, key_ref
                )))
            } else {
                Err(StorageError::DownloadFailed(format!(
                    "Blob store returned {} for {}",
                    status, key_ref
                )))
            }
        })
        .await
    }

    fn backend_kind(&self) -> StorageBackend {
        StorageBackend::Sidecar
    }
}
