//! Blob engine trait: the innermost storage layer for result records.

use async_trait::async_trait;
use bytes::Bytes;

/// Opaque key/value blob storage.
///
/// `put` always overwrites. Wrapped in `Arc<dyn BlobEngine>` and shared by
/// every in-flight handler, so implementations must be safe for concurrent
/// use without external locking.
#[async_trait]
pub trait BlobEngine: Send + Sync + 'static {
    /// Store `data` under `key`, replacing any existing blob.
    async fn put(&self, key: &str, data: Bytes) -> anyhow::Result<()>;

    /// Fetch the blob under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Bytes>>;

    /// Short engine name for logs.
    fn kind(&self) -> &'static str;
}
