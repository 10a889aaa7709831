#![allow(dead_code)]

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use shelfie_core::Config;
use shelfie_gateway::{InMemoryPolicyStore, ObjectGateway, ObjectRead, PolicyEngine, StaticGroups};
use shelfie_storage::LocalStorage;
use tempfile::TempDir;
use tokio::io::AsyncRead;

use futures::StreamExt;

pub const DEFAULT_CEILING: u64 = 10 * 1024 * 1024;

/// A gateway wired to a local backend in a temp directory, plus handles
/// the tests poke at directly.
pub struct TestGateway {
    pub gateway: ObjectGateway,
    pub policies: Arc<InMemoryPolicyStore>,
    pub dir: TempDir,
}

impl TestGateway {
    pub fn storage_root(&self) -> &Path {
        self.dir.path()
    }
}

pub fn test_config(root: &Path, max_upload_size_bytes: u64) -> Config {
    Config {
        environment: "test".to_string(),
        storage_backend: None,
        sidecar_credential_url: None,
        sidecar_blob_endpoint: None,
        sidecar_bucket: "shelfie-objects".to_string(),
        local_storage_path: root.to_string_lossy().into_owned(),
        public_base_url: "http://localhost:4000".to_string(),
        max_upload_size_bytes,
    }
}

pub async fn setup_gateway() -> TestGateway {
    setup_gateway_with(DEFAULT_CEILING, StaticGroups::new()).await
}

pub async fn setup_gateway_with(max_upload_size_bytes: u64, groups: StaticGroups) -> TestGateway {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), max_upload_size_bytes);

    let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
    let policies = Arc::new(InMemoryPolicyStore::new());
    let engine = PolicyEngine::new(policies.clone(), Arc::new(groups));

    TestGateway {
        gateway: ObjectGateway::new(storage, engine, &config),
        policies,
        dir,
    }
}

pub fn reader_for(data: Vec<u8>) -> Pin<Box<dyn AsyncRead + Send + Unpin>> {
    Box::pin(std::io::Cursor::new(data))
}

pub fn png_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.resize(len.max(8), 0x11);
    data
}

pub fn jpeg_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.resize(len.max(4), 0x22);
    data
}

pub fn webp_payload(len: usize) -> Vec<u8> {
    let mut data = b"RIFF".to_vec();
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    data.extend_from_slice(b"WEBPVP8 ");
    data.resize(len.max(12), 0x33);
    data
}

pub async fn collect_read(read: ObjectRead) -> Vec<u8> {
    let mut out = Vec::new();
    let mut stream = read.stream;
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}
