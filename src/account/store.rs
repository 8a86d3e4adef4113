//! Credential snapshot persistence
//!
//! The pool is written to a JSON file after every mutation so tokens and
//! usage counters survive restarts. The snapshot is pure serialization;
//! rotation policy lives in the controller.

use crate::account::{CredentialRecord, PoolError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct PoolSnapshot {
    accounts: Vec<CredentialRecord>,
    last_updated: i64,
}

/// Reads and writes the credential-pool snapshot file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot, if one exists
    ///
    /// A missing file is not an error: the pool starts from configuration
    /// alone on first run.
    pub fn load(&self) -> Result<Option<Vec<CredentialRecord>>, PoolError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| PoolError::Snapshot(e.to_string()))?;
        let snapshot: PoolSnapshot =
            serde_json::from_str(&content).map_err(|e| PoolError::Snapshot(e.to_string()))?;
        Ok(Some(snapshot.accounts))
    }

    /// Writes the snapshot, creating parent directories as needed
    pub fn save(&self, records: &[CredentialRecord]) -> Result<(), PoolError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PoolError::Snapshot(e.to_string()))?;
        }
        let snapshot = PoolSnapshot {
            accounts: records.to_vec(),
            last_updated: Utc::now().timestamp(),
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| PoolError::Snapshot(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| PoolError::Snapshot(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("pool.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("pool.json"));

        let mut record = CredentialRecord::new("13800000001", None);
        record.token = "tok".to_string();
        record.error_count = 3;
        store.save(std::slice::from_ref(&record)).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].handle, "13800000001");
        assert_eq!(loaded[0].token, "tok");
        assert_eq!(loaded[0].error_count, 3);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("nested/deeper/pool.json"));
        store
            .save(&[CredentialRecord::new("13800000001", None)])
            .unwrap();
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn test_load_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pool.json");
        std::fs::write(&path, "not json").unwrap();

        let store = CredentialStore::new(path);
        assert!(matches!(
            store.load().unwrap_err(),
            PoolError::Snapshot(_)
        ));
    }
}
