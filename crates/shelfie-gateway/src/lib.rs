//! Shelfie Gateway Library
//!
//! The object gateway is the only storage component visible to the rest of
//! the application. It validates uploads, evaluates access policies, and
//! dispatches to whichever backend was resolved at startup; callers never
//! learn which backend served them.

pub mod gateway;
pub mod policy;
pub mod validator;

// Re-export commonly used types
pub use gateway::{ObjectByteStream, ObjectGateway, ObjectRead, StoredUpload};
pub use policy::{
    GroupResolver, InMemoryPolicyStore, Operation, PolicyEngine, PolicyStore, StaticGroups,
    AUTHENTICATED_GROUP,
};
pub use validator::{UploadValidator, ValidatedUpload};
