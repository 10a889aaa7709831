//! Object gateway
//!
//! The single entry point the rest of the application uses for stored
//! objects. Validation and policy checks run here; backend identity and
//! backend-specific errors never cross this boundary. The error surface is
//! exactly the [`ObjectError`] taxonomy.

use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use shelfie_core::{AccessPolicy, Category, Config, ObjectError, ObjectPath};
use shelfie_storage::{ObjectStore, StorageError};
use tokio::io::AsyncRead;

use crate::policy::{Operation, PolicyEngine};
use crate::validator::UploadValidator;

/// Byte stream handed past the gateway; items carry gateway-level errors.
pub type ObjectByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ObjectError>> + Send>>;

/// Result of a successful upload.
pub struct StoredUpload {
    pub path: ObjectPath,
    pub content_type: &'static str,
    pub size_bytes: u64,
    pub url: String,
}

/// Result of a successful read: content type is derived from the validated
/// path extension, never from caller input at read time.
pub struct ObjectRead {
    pub content_type: &'static str,
    pub content_length: u64,
    pub stream: ObjectByteStream,
}

pub struct ObjectGateway {
    storage: Arc<dyn ObjectStore>,
    policies: PolicyEngine,
    validator: UploadValidator,
    public_base_url: String,
}

impl ObjectGateway {
    pub fn new(storage: Arc<dyn ObjectStore>, policies: PolicyEngine, config: &Config) -> Self {
        ObjectGateway {
            storage,
            policies,
            validator: UploadValidator::new(config.max_upload_size_bytes),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Parse a logical path string from the serving route. Malformed paths
    /// report `NotFound`; nothing distinguishes them from absent objects.
    pub fn resolve_path(raw: &str) -> Result<ObjectPath, ObjectError> {
        ObjectPath::parse(raw).map_err(|_| ObjectError::NotFound)
    }

    /// Store an uploaded payload: validate, authorize creation, dispatch
    /// to the backend, then attach the owner policy.
    pub async fn store(
        &self,
        category: Category,
        declared_mime: &str,
        declared_size: Option<u64>,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
        identity: &str,
    ) -> Result<StoredUpload, ObjectError> {
        let upload = self
            .validator
            .validate(declared_mime, declared_size, reader)
            .await?;

        if !self.policies.authorize_create(category, identity).await {
            return Err(ObjectError::AccessDenied);
        }

        // Fresh id per upload; the validator, not the caller, decided the
        // extension.
        let format = upload.format;
        let path = ObjectPath::generate(category, format);
        let limit_guard = upload.limit_guard();

        let size_bytes = self
            .storage
            .put(&path, format.mime(), declared_size, upload.reader)
            .await
            .map_err(|e| {
                if limit_guard.load(Ordering::Relaxed) {
                    ObjectError::TooLarge {
                        limit_bytes: self.validator.max_size_bytes(),
                    }
                } else {
                    translate_storage_error(e)
                }
            })?;

        self.policies
            .store()
            .attach(&path, AccessPolicy::private(identity))
            .await;

        tracing::info!(
            path = %path,
            owner = %identity,
            size_bytes = size_bytes,
            "Object stored"
        );

        Ok(StoredUpload {
            url: path.url(&self.public_base_url, None),
            content_type: format.mime(),
            size_bytes,
            path,
        })
    }

    /// Read an object back as a stream. Authorization runs first and a
    /// denial is returned without consulting the backend, so it reveals
    /// nothing about whether the path exists.
    pub async fn fetch(&self, path: &ObjectPath, identity: &str) -> Result<ObjectRead, ObjectError> {
        if !self.policies.authorize(path, identity, Operation::Read).await {
            return Err(ObjectError::AccessDenied);
        }

        let download = self
            .storage
            .get(path)
            .await
            .map_err(translate_storage_error)?;

        let stream = download
            .stream
            .map(|chunk| chunk.map_err(translate_storage_error));

        Ok(ObjectRead {
            content_type: path.format().mime(),
            content_length: download.content_length,
            stream: Box::pin(stream),
        })
    }

    /// Read-authorized existence check.
    pub async fn exists(&self, path: &ObjectPath, identity: &str) -> Result<bool, ObjectError> {
        if !self.policies.authorize(path, identity, Operation::Read).await {
            return Err(ObjectError::AccessDenied);
        }

        self.storage
            .exists(path)
            .await
            .map_err(translate_storage_error)
    }

    /// Replace an object's policy. Owner-gated; ownership itself never
    /// transfers. This is how visibility changes without re-uploading.
    pub async fn update_policy(
        &self,
        path: &ObjectPath,
        identity: &str,
        policy: AccessPolicy,
    ) -> Result<(), ObjectError> {
        let current = self
            .policies
            .store()
            .lookup(path)
            .await
            .ok_or(ObjectError::AccessDenied)?;

        if identity.is_empty() || identity != current.owner {
            return Err(ObjectError::AccessDenied);
        }

        let policy = AccessPolicy {
            owner: current.owner,
            ..policy
        };
        self.policies.store().attach(path, policy).await;

        tracing::info!(path = %path, "Object policy updated");
        Ok(())
    }
}

/// Normalize backend errors into the gateway taxonomy. Internal detail is
/// logged here and dropped; messages never carry filesystem paths, bucket
/// names, or credentials past the gateway.
fn translate_storage_error(err: StorageError) -> ObjectError {
    match err {
        StorageError::NotFound(_) | StorageError::InvalidKey(_) => ObjectError::NotFound,
        other => {
            tracing::error!(error = %other, "Storage backend error");
            ObjectError::BackendUnavailable
        }
    }
}
