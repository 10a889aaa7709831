//! Bounded exponential backoff for transient sidecar failures.
//!
//! Only `StorageError::Transient` is retried; validation failures and 4xx
//! responses surface immediately.

use std::future::Future;

use crate::traits::{StorageError, StorageResult};

pub(crate) const MAX_RETRIES: u32 = 3;
pub(crate) const BASE_DELAY_MS: u64 = 200;

/// Whether a reqwest error is worth retrying: connection refused, timeout,
/// or a 5xx status. Everything else is surfaced immediately.
pub(crate) fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect()
        || err.is_timeout()
        || err
            .status()
            .map(|status| status.is_server_error())
            .unwrap_or(false)
}

/// Run `operation`, retrying transient failures with exponential backoff.
/// The closure is re-invoked per attempt, so request bodies must be
/// rebuildable (the sidecar backend spools uploads for this reason).
pub(crate) async fn with_retry<T, F, Fut>(op_name: &str, mut operation: F) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=MAX_RETRIES {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(StorageError::Transient(msg)) => {
                last_error = Some(StorageError::Transient(msg));
                if attempt < MAX_RETRIES {
                    let delay_ms = BASE_DELAY_MS << attempt;
                    tracing::warn!(
                        operation = op_name,
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        delay_ms = delay_ms,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        StorageError::Transient(format!("{} failed after all retries", op_name))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_until_success() {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let result = with_retry("test", || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StorageError::Transient("boom".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retry_budget_on_persistent_transient_failure() {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let result: StorageResult<()> = with_retry("test", || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Transient("still down".to_string()))
        })
        .await;
        assert!(matches!(result, Err(StorageError::Transient(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_RETRIES + 1);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let result: StorageResult<()> = with_retry("test", || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::UploadFailed("bad request".to_string()))
        })
        .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
