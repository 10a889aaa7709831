//! Shelfie Storage Library
//!
//! This crate provides the object storage abstraction and the backend
//! implementations behind it: the local filesystem backend and the remote
//! sidecar backend.
//!
//! # Storage key format
//!
//! Keys are the rendered form of an `ObjectPath`: `{category}/{id}.{ext}`.
//! All backends use the same layout, so a deployment can move between
//! backends without remapping anything. Keys never contain `..` or a
//! leading `/`; the local backend re-checks this before touching the
//! filesystem.
//!
//! Which backend is active is resolved exactly once at process startup by
//! [`create_storage`] and never re-evaluated per request.

#[cfg(feature = "backend-sidecar")]
pub mod credentials;
pub mod factory;
#[cfg(feature = "backend-local")]
pub mod local;
#[cfg(feature = "backend-sidecar")]
pub(crate) mod retry;
#[cfg(feature = "backend-sidecar")]
pub mod sidecar;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "backend-sidecar")]
pub use credentials::CredentialBroker;
pub use factory::create_storage;
#[cfg(feature = "backend-local")]
pub use local::LocalStorage;
pub use shelfie_core::StorageBackend;
#[cfg(feature = "backend-sidecar")]
pub use sidecar::SidecarStorage;
pub use traits::{ByteStream, ObjectDownload, ObjectStore, StorageError, StorageResult};
