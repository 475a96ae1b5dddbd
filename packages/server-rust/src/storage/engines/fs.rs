//! Filesystem [`BlobEngine`]: one file per key inside a directory.
//!
//! Writes go to a uniquely named temporary file first and are then renamed
//! over the target, so a reader never observes a partially written blob and
//! concurrent writers to the same key leave one complete version behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::storage::engine::BlobEngine;

const BLOB_EXTENSION: &str = "json";

/// Directory-backed blob storage.
#[derive(Debug, Clone)]
pub struct FsBlobEngine {
    root: PathBuf,
}

impl FsBlobEngine {
    /// Opens (creating if needed) the blob directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create blob directory {}", root.display()))?;
        debug!(root = %root.display(), "Blob directory ready");
        Ok(Self { root })
    }

    /// Directory holding the blobs.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{BLOB_EXTENSION}")))
    }
}

/// Keys map directly to file names, so only a conservative character set is
/// accepted.
fn validate_key(key: &str) -> anyhow::Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    anyhow::ensure!(valid, "invalid blob key: {key:?}");
    Ok(())
}

/// Temporary blob file, removed on drop unless it was renamed into place.
///
/// Also covers a `put` future dropped mid-write.
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            persisted: false,
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl BlobEngine for FsBlobEngine {
    async fn put(&self, key: &str, data: Bytes) -> anyhow::Result<()> {
        let target = self.path_for(key)?;
        let tmp_name = format!(".{key}.{}.tmp", Uuid::new_v4().simple());
        let mut tmp = TempFile::new(self.root.join(tmp_name));

        tokio::fs::write(&tmp.path, &data)
            .await
            .with_context(|| format!("failed to write blob {key}"))?;
        tokio::fs::rename(&tmp.path, &target)
            .await
            .with_context(|| format!("failed to commit blob {key}"))?;
        tmp.persisted = true;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read blob {key}")),
        }
    }

    fn kind(&self) -> &'static str {
        "fs"
    }
}
