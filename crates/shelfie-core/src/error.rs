//! Error types module
//!
//! [`ObjectError`] is the complete error surface of the object gateway: the
//! only kinds the rest of the application needs to branch on. Backend and
//! validator internals are normalized into these before crossing the
//! gateway boundary, and no message ever carries an internal filesystem
//! path, bucket name, or credential.
//!
//! Configuration problems are not represented here; they are fatal at
//! startup and surface as `anyhow` errors from config loading and backend
//! resolution.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
/// The HTTP route layer renders errors from this without matching variants.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "PAYLOAD_TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("Upload exceeds the size limit of {limit_bytes} bytes")]
    TooLarge { limit_bytes: u64 },

    #[error("Unsupported or mismatched content type")]
    UnsupportedType,

    #[error("Access denied")]
    AccessDenied,

    #[error("Object not found")]
    NotFound,

    #[error("Storage backend unavailable")]
    BackendUnavailable,
}

impl ErrorMetadata for ObjectError {
    fn http_status_code(&self) -> u16 {
        match self {
            ObjectError::TooLarge { .. } => 413,
            ObjectError::UnsupportedType => 415,
            ObjectError::AccessDenied => 403,
            ObjectError::NotFound => 404,
            ObjectError::BackendUnavailable => 503,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ObjectError::TooLarge { .. } => "PAYLOAD_TOO_LARGE",
            ObjectError::UnsupportedType => "UNSUPPORTED_MEDIA_TYPE",
            ObjectError::AccessDenied => "ACCESS_DENIED",
            ObjectError::NotFound => "NOT_FOUND",
            ObjectError::BackendUnavailable => "BACKEND_UNAVAILABLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Client-caused errors never succeed on retry; only a backend
        // outage can clear up on its own.
        matches!(self, ObjectError::BackendUnavailable)
    }

    fn client_message(&self) -> String {
        self.to_string()
    }

    fn log_level(&self) -> LogLevel {
        match self {
            ObjectError::TooLarge { .. } | ObjectError::UnsupportedType => LogLevel::Debug,
            ObjectError::AccessDenied | ObjectError::NotFound => LogLevel::Debug,
            ObjectError::BackendUnavailable => LogLevel::Error,
        }
    }
}
