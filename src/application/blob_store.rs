// Blob storage trait - collaborator boundary for persisted images
use async_trait::async_trait;

use crate::error::Result;

/// Durable blob storage the relay writes images into. A write must be
/// fully published before it returns: a name handed back by `write` never
/// refers to a partial file.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `name`, returning the stored size in bytes.
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<u64>;

    /// List stored blob names, newest first.
    async fn list(&self) -> Result<Vec<String>>;

    /// Remove every stored blob.
    async fn delete_all(&self) -> Result<()>;
}
