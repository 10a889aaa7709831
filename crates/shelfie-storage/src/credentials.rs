//! Sidecar credential broker client
//!
//! The sidecar issues short-lived bearer credentials for the blob store.
//! The current credential is cached with its expiry and refreshed lazily on
//! first use after expiry. Refresh is guarded by a single async mutex, so
//! concurrent requests arriving during a refresh all await the one
//! in-flight fetch instead of issuing their own.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::retry::{is_transient, with_retry};
use crate::traits::{StorageError, StorageResult};

/// Refresh this long before the advertised expiry so an in-flight request
/// never sends a token that dies mid-call.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Wire format of the broker's credential grant.
#[derive(Debug, Clone, Deserialize)]
struct CredentialGrant {
    token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedCredential {
    fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

/// Client for the co-located credential-issuing sidecar process.
pub struct CredentialBroker {
    http: reqwest::Client,
    credential_url: String,
    cached: Mutex<Option<CachedCredential>>,
}

impl CredentialBroker {
    pub fn new(http: reqwest::Client, credential_url: String) -> Self {
        CredentialBroker {
            http,
            credential_url,
            cached: Mutex::new(None),
        }
    }

    /// Current bearer token, refreshing it first if expired.
    ///
    /// The cache mutex is held across the refresh, which is what makes the
    /// refresh single-flight: callers that arrive mid-refresh queue on the
    /// lock and then read the credential the winner installed.
    pub async fn token(&self) -> StorageResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(credential) = cached.as_ref() {
            if !credential.is_expired() {
                return Ok(credential.token.clone());
            }
        }

        let grant = self.fetch_grant().await?;
        let credential = CachedCredential {
            token: grant.token,
            expires_at: Utc::now() + Duration::seconds(grant.expires_in as i64),
        };
        let token = credential.token.clone();
        *cached = Some(credential);

        tracing::info!("Refreshed sidecar credential");
        Ok(token)
    }

    /// Startup reachability check: fetch and install one credential.
    /// An unreachable broker here is a configuration error, not a
    /// per-request retryable condition.
    pub async fn validate(&self) -> StorageResult<()> {
        self.token().await.map_err(|e| {
            StorageError::ConfigError(format!("Credential broker unreachable: {}", e))
        })?;
        Ok(())
    }

    async fn fetch_grant(&self) -> StorageResult<CredentialGrant> {
        with_retry("credential_fetch", || async move {
            let response = self
                .http
                .get(&self.credential_url)
                .send()
                .await
                .map_err(|e| {
                    if is_transient(&e) {
                        StorageError::Transient(format!("Credential fetch failed: {}", e))
                    } else {
                        StorageError::ConfigError(format!("Credential fetch failed: {}", e))
                    }
                })?;

            let status = response.status();
            if status.is_server_error() {
                return Err(StorageError::Transient(format!(
                    "Credential broker returned {}",
                    status
                )));
            }
            if !status.is_success() {
                return Err(StorageError::ConfigError(format!(
                    "Credential broker returned {}",
                    status
                )));
            }

            response.json::<CredentialGrant>().await.map_err(|e| {
                StorageError::ConfigError(format!("Invalid credential grant: {}", e))
            })
        })
        .await
    }
}
