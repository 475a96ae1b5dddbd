//! Result store gateway: JSON-serialized [`ResultRecord`]s over a [`BlobEngine`].

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use relay_core::{decode_result, encode, ResultRecord};

use crate::storage::engine::BlobEngine;
use crate::traits::ResultStore;

/// [`ResultStore`] writing one blob per request id.
///
/// Only terminal records are accepted, and the key must match the record's
/// own id, so a stored blob always describes the request it is keyed by.
#[derive(Clone)]
pub struct BlobResultStore {
    engine: Arc<dyn BlobEngine>,
}

impl BlobResultStore {
    #[must_use]
    pub fn new(engine: Arc<dyn BlobEngine>) -> Self {
        Self { engine }
    }

    /// Engine kind, for logs and health output.
    #[must_use]
    pub fn engine_kind(&self) -> &'static str {
        self.engine.kind()
    }
}

#[async_trait]
impl ResultStore for BlobResultStore {
    async fn put(&self, id: &str, record: &ResultRecord) -> anyhow::Result<()> {
        anyhow::ensure!(
            record.status.is_terminal(),
            "refusing to persist non-terminal result for {id}"
        );
        anyhow::ensure!(
            record.key() == id,
            "result key {id} does not match record id {}",
            record.id
        );
        let body = encode(record).context("failed to encode result record")?;
        self.engine.put(id, Bytes::from(body)).await
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<ResultRecord>> {
        let Some(body) = self.engine.get(id).await? else {
            return Ok(None);
        };
        let record =
            decode_result(&body).with_context(|| format!("corrupt result blob for {id}"))?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use relay_core::{RequestMessage, RequestStatus};

    use super::*;
    use crate::storage::engines::HashMapBlobEngine;

    fn store() -> (BlobResultStore, Arc<HashMapBlobEngine>) {
        let engine = Arc::new(HashMapBlobEngine::new());
        (BlobResultStore::new(engine.clone()), engine)
    }

    #[tokio::test]
    async fn put_then_get() {
        let (store, _) = store();
        let record = RequestMessage::new("alice", "deadbeef").succeed();

        store.put(&record.key(), &record).await.unwrap();
        let loaded = store.get(&record.key()).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn reports_engine_kind() {
        let (store, _) = store();
        assert_eq!(store.engine_kind(), "memory");
    }

    #[tokio::test]
    async fn stored_blob_is_camel_case_json() {
        let (store, engine) = store();
        let record = RequestMessage::new("ghost", "x").fail();
        store.put(&record.key(), &record).await.unwrap();

        let raw = engine.get(&record.key()).await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["value"], "");
        assert_eq!(json["id"], record.id.to_string());
    }

    #[tokio::test]
    async fn put_overwrites_previous_record() {
        let (store, engine) = store();
        let record = RequestMessage::new("alice", "deadbeef").succeed();
        store.put(&record.key(), &record).await.unwrap();
        store.put(&record.key(), &record).await.unwrap();

        assert_eq!(engine.len(), 1);
        assert_eq!(store.get(&record.key()).await.unwrap().unwrap(), record);
    }

    #[tokio::test]
    async fn missing_id_is_none() {
        let (store, _) = store();
        assert!(store.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_in_progress_records() {
        let (store, engine) = store();
        let msg = RequestMessage::new("alice", "x");
        let record = ResultRecord {
            id: msg.id,
            status: RequestStatus::InProgress,
            value: String::new(),
        };
        assert!(store.put(&record.key(), &record).await.is_err());
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn rejects_mismatched_key() {
        let (store, _) = store();
        let record = RequestMessage::new("alice", "x").succeed();
        assert!(store.put("other-id", &record).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_blob_is_an_error() {
        let (store, engine) = store();
        engine.put("bad", Bytes::from_static(b"not json")).await.unwrap();
        assert!(store.get("bad").await.is_err());
    }
}
