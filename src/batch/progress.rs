//! Run progress persistence
//!
//! Three small files keep a long batch run recoverable: a JSON
//! checkpoint with the next offset and counters, a JSON error log, and
//! a pause sentinel whose mere existence requests a halt between
//! entities.

use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Snapshot of batch progress, written every N entities and at halt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Index of the next entity to process
    pub offset: usize,
    pub total: usize,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Short names already handled (any outcome)
    pub processed_entities: Vec<String>,
    /// Hash of the configuration the run started with
    pub config_hash: String,
    pub timestamp: String,
}

/// Reads and writes the checkpoint file
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let checkpoint = serde_json::from_str(&content)?;
        Ok(Some(checkpoint))
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(checkpoint)?)?;
        Ok(())
    }
}

/// One logged entity failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: String,
    pub entity: String,
    pub error_type: String,
    pub message: String,
}

/// Append-only error log, persisted as a JSON array
pub struct ErrorLog {
    path: PathBuf,
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Records a failure and rewrites the log file. A write failure is
    /// logged, never fatal to the run.
    pub fn record(&mut self, entity: &str, error_type: &str, message: &str) {
        tracing::warn!(entity, error_type, message, "Entity failure recorded");
        self.entries.push(ErrorEntry {
            timestamp: Utc::now().to_rfc3339(),
            entity: entity.to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
        });
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to persist error log: {}", e);
        }
    }

    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sentinel file requesting a clean halt between entities
pub struct PauseFlag {
    path: PathBuf,
}

impl PauseFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    /// Marks an interrupted run so the operator sees why it stopped.
    /// The file carries no content; only its existence matters.
    pub fn set(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, b"")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("progress.json"));

        let checkpoint = Checkpoint {
            offset: 120,
            total: 500,
            processed: 120,
            succeeded: 100,
            failed: 20,
            processed_entities: vec!["24BOND01".to_string()],
            config_hash: "abc123".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        store.save(&checkpoint).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.offset, 120);
        assert_eq!(loaded.succeeded, 100);
        assert_eq!(loaded.processed_entities, vec!["24BOND01".to_string()]);
        assert_eq!(loaded.config_hash, "abc123");
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("progress.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_error_log_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("errors.json");
        let mut log = ErrorLog::new(&path);

        log.record("24BOND01", "NO_DOCUMENTS", "nothing found");
        log.record("24BOND02", "FETCH_FAILED", "timeout");
        assert_eq!(log.len(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<ErrorEntry> = serde_json::from_str(&content).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity, "24BOND01");
        assert_eq!(entries[1].error_type, "FETCH_FAILED");
    }

    #[test]
    fn test_pause_flag_lifecycle() {
        let dir = TempDir::new().unwrap();
        let flag = PauseFlag::new(dir.path().join("pause.flag"));

        assert!(!flag.is_set());
        flag.set().unwrap();
        assert!(flag.is_set());
        // Only existence signals the halt; the file stays empty
        assert_eq!(std::fs::metadata(flag.path()).unwrap().len(), 0);
        flag.clear().unwrap();
        assert!(!flag.is_set());
        // Clearing an absent flag is fine
        flag.clear().unwrap();
    }
}
