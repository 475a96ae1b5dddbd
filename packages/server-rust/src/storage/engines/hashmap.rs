//! In-memory [`BlobEngine`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::storage::engine::BlobEngine;

/// In-memory blob storage. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct HashMapBlobEngine {
    entries: DashMap<String, Bytes>,
}

impl HashMapBlobEngine {
    /// Creates a new, empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl BlobEngine for HashMapBlobEngine {
    async fn put(&self, key: &str, data: Bytes) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
