use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("blob store error: {0}")]
    Store(String),

    #[error("upload timed out")]
    Timeout,
}

/// Seam to hosted blob storage. The engine stores only the returned URL,
/// never raw bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` under `owner/kind` and return a retrievable URL.
    async fn put(&self, owner: &str, kind: &str, bytes: Vec<u8>) -> Result<String, MediaError>;
}

/// In-memory stand-in used by tests and local runs.
#[derive(Default)]
pub struct MockBlobStore;

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, owner: &str, kind: &str, bytes: Vec<u8>) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Store("empty upload".to_string()));
        }
        Ok(format!("https://blobs.switchback.test/{}/{}", owner, kind))
    }
}
