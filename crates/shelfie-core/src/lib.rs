//! Shelfie Core Library
//!
//! This crate provides the domain types, configuration, error taxonomy, and
//! telemetry initialization shared across the shelfie object storage
//! components. It performs no I/O of its own.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorMetadata, LogLevel, ObjectError};
pub use models::object_path::{Category, ImageFormat, ObjectPath, ObjectPathError};
pub use models::policy::{AccessPolicy, Permission, PolicyRule, Principal, Visibility};
pub use storage_types::StorageBackend;
