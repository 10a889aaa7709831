//! Configuration module
//!
//! Storage configuration is read from the environment exactly once at
//! process startup and passed by reference from then on. Backend identity
//! is an infrastructure property, not a request property: nothing here is
//! re-read at request time.

use std::env;

use crate::storage_types::StorageBackend;

// Common constants
const DEFAULT_MAX_UPLOAD_SIZE_MB: u64 = 10;
const DEFAULT_LOCAL_STORAGE_PATH: &str = "./data/objects";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:4000";
const DEFAULT_SIDECAR_BUCKET: &str = "shelfie-objects";

/// Object storage configuration.
///
/// Backend selection inputs, in priority order: an explicit override
/// (`STORAGE_BACKEND`), presence of a sidecar credential endpoint
/// (`SIDECAR_CREDENTIAL_URL`), then the local filesystem default.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// Explicit backend override; an unknown value fails startup.
    pub storage_backend: Option<StorageBackend>,
    /// Credential broker endpoint; its presence marks a sidecar deployment.
    pub sidecar_credential_url: Option<String>,
    /// Blob store API endpoint used by the sidecar backend.
    pub sidecar_blob_endpoint: Option<String>,
    pub sidecar_bucket: String,
    pub local_storage_path: String,
    pub public_base_url: String,
    pub max_upload_size_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<StorageBackend>()
                    .map_err(|e| anyhow::anyhow!("STORAGE_BACKEND: {}", e))?,
            ),
            _ => None,
        };

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE_MB);

        let config = Config {
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
            storage_backend,
            sidecar_credential_url: env::var("SIDECAR_CREDENTIAL_URL").ok(),
            sidecar_blob_endpoint: env::var("SIDECAR_BLOB_ENDPOINT").ok(),
            sidecar_bucket: env::var("SIDECAR_BUCKET")
                .unwrap_or_else(|_| DEFAULT_SIDECAR_BUCKET.to_string()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| DEFAULT_LOCAL_STORAGE_PATH.to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string()),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject contradictory configuration. Called at startup; failures here
    /// are fatal and never surface at request time.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.storage_backend == Some(StorageBackend::Sidecar) {
            if self.sidecar_credential_url.is_none() {
                return Err(anyhow::anyhow!(
                    "STORAGE_BACKEND=sidecar requires SIDECAR_CREDENTIAL_URL"
                ));
            }
            if self.sidecar_blob_endpoint.is_none() {
                return Err(anyhow::anyhow!(
                    "STORAGE_BACKEND=sidecar requires SIDECAR_BLOB_ENDPOINT"
                ));
            }
        }

        if self.sidecar_credential_url.is_some() && self.sidecar_blob_endpoint.is_none() {
            return Err(anyhow::anyhow!(
                "SIDECAR_CREDENTIAL_URL is set but SIDECAR_BLOB_ENDPOINT is not"
            ));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be positive"));
        }

        Ok(())
    }

    /// The backend this process will use, per the selection priority.
    /// Immutable for the process lifetime.
    pub fn resolved_backend(&self) -> StorageBackend {
        match self.storage_backend {
            Some(backend) => backend,
            None if self.sidecar_credential_url.is_some() => StorageBackend::Sidecar,
            None => StorageBackend::Local,
        }
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            environment: "test".to_string(),
            storage_backend: None,
            sidecar_credential_url: None,
            sidecar_blob_endpoint: None,
            sidecar_bucket: DEFAULT_SIDECAR_BUCKET.to_string(),
            local_storage_path: DEFAULT_LOCAL_STORAGE_PATH.to_string(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            max_upload_size_bytes: DEFAULT_MAX_UPLOAD_SIZE_MB * 1024 * 1024,
        }
    }

    #[test]
    fn defaults_resolve_to_local() {
        let config = base_config();
        config.validate().unwrap();
        assert_eq!(config.resolved_backend(), StorageBackend::Local);
    }

    #[test]
    fn sidecar_marker_resolves_to_sidecar() {
        let config = Config {
            sidecar_credential_url: Some("http://localhost:8333/token".to_string()),
            sidecar_blob_endpoint: Some("http://localhost:8334".to_string()),
            ..base_config()
        };
        config.validate().unwrap();
        assert_eq!(config.resolved_backend(), StorageBackend::Sidecar);
    }

    #[test]
    fn explicit_override_wins_over_marker() {
        let config = Config {
            storage_backend: Some(StorageBackend::Local),
            sidecar_credential_url: Some("http://localhost:8333/token".to_string()),
            sidecar_blob_endpoint: Some("http://localhost:8334".to_string()),
            ..base_config()
        };
        config.validate().unwrap();
        assert_eq!(config.resolved_backend(), StorageBackend::Local);
    }

    #[test]
    fn sidecar_override_without_broker_is_rejected() {
        let config = Config {
            storage_backend: Some(StorageBackend::Sidecar),
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn marker_without_blob_endpoint_is_rejected() {
        let config = Config {
            sidecar_credential_url: Some("http://localhost:8333/token".to_string()),
            ..base_config()
        };
        assert!(config.validate().is_err());
    }
}
