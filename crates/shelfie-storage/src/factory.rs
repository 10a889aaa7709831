//! Backend resolver
//!
//! Resolves which storage backend is active for this process. Called once
//! at startup; the returned handle is shared for the process lifetime and
//! selection is never re-evaluated per request. Contradictory configuration
//! fails here, fatally, before any request is served.

use std::sync::Arc;

#[cfg(feature = "backend-local")]
use crate::LocalStorage;
#[cfg(feature = "backend-sidecar")]
use crate::SidecarStorage;
use crate::{ObjectStore, StorageBackend, StorageError, StorageResult};
use shelfie_core::Config;

/// Create the storage backend selected by configuration.
///
/// Selection priority: explicit override, then sidecar-marker presence,
/// then the local filesystem default.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn ObjectStore>> {
    let backend = config.resolved_backend();

    match backend {
        #[cfg(feature = "backend-sidecar")]
        StorageBackend::Sidecar => {
            let credential_url = config.sidecar_credential_url.clone().ok_or_else(|| {
                StorageError::ConfigError("SIDECAR_CREDENTIAL_URL not configured".to_string())
            })?;
            let endpoint = config.sidecar_blob_endpoint.clone().ok_or_else(|| {
                StorageError::ConfigError("SIDECAR_BLOB_ENDPOINT not configured".to_string())
            })?;

            let storage =
                SidecarStorage::new(endpoint, config.sidecar_bucket.clone(), credential_url)?;
            storage.validate().await?;

            tracing::info!(backend = %backend, "Storage backend resolved");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "backend-sidecar"))]
        StorageBackend::Sidecar => Err(StorageError::ConfigError(
            "Sidecar storage backend not available (backend-sidecar feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "backend-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.local_storage_path.clone()).await?;

            tracing::info!(backend = %backend, "Storage backend resolved");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "backend-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (backend-local feature not enabled)".to_string(),
        )),
    }
}
