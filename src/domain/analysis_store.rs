//! Persistence for the analysis outputs.
//!
//! Both the aggregated cluster model (`report_data.json`) and the findings
//! report (`analysis_data.json`) are stored wrapped with integrity metadata
//! and written atomically: serialize to a `.tmp` sibling, then rename.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

/// A serialized document wrapped with integrity metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument<T> {
    /// SHA-256 checksum of the serialized payload: "sha256:<hex>"
    pub checksum: String,
    /// When the document was produced.
    pub analyzed_at: DateTime<Utc>,
    /// Version of the analyzer that produced it.
    pub analyzer_version: String,
    pub data: T,
}

fn checksum_of<T: Serialize>(data: &T) -> String {
    let serialized = serde_json::to_string(data).unwrap_or_default();
    let hash = Sha256::digest(serialized.as_bytes());
    format!("sha256:{hash:x}")
}

impl<T: Serialize> StoredDocument<T> {
    pub fn new(data: T) -> Self {
        Self {
            checksum: checksum_of(&data),
            analyzed_at: Utc::now(),
            analyzer_version: env!("CARGO_PKG_VERSION").to_string(),
            data,
        }
    }

    /// Whether the checksum still matches the payload.
    pub fn verify(&self) -> bool {
        self.checksum == checksum_of(&self.data)
    }
}

pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Atomically write a document to disk, so the file on disk is always a
    /// complete serialization.
    pub fn write<T: Serialize>(&self, stored: &StoredDocument<T>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(stored).context("failed to serialize document")?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("writing temp file {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming {} to {}", tmp_path.display(), self.path.display()))?;

        Ok(())
    }

    /// Read a document back and verify its checksum.
    pub fn read<T: DeserializeOwned + Serialize>(&self) -> Result<StoredDocument<T>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;

        let stored: StoredDocument<T> = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        if !stored.verify() {
            warn!(path = %self.path.display(), "document checksum mismatch");
            bail!("checksum verification failed for {}", self.path.display());
        }

        Ok(stored)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster_state::ClusterState;

    #[test]
    fn round_trips_with_valid_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("report_data.json"));

        let mut state = ClusterState::default();
        state.node("alpha").is_included = true;
        store.write(&StoredDocument::new(state)).unwrap();

        let loaded: StoredDocument<ClusterState> = store.read().unwrap();
        assert!(loaded.verify());
        assert!(loaded.data.nodes["alpha"].is_included);
        assert!(!dir.path().join("report_data.json.tmp").exists());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("report_data.json"));
        store
            .write(&StoredDocument::new(ClusterState::default()))
            .unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let tampered = content.replace("\"data_complete\": true", "\"data_complete\": false");
        std::fs::write(store.path(), tampered).unwrap();

        assert!(store.read::<ClusterState>().is_err());
    }
}
