//! Persistent state store for tracked recordings.
//!
//! A single JSON file under the output directory holds two mappings:
//! file name → processing status, and the set of content fingerprints that
//! have already been imported into the journal. The store is the only
//! resource shared between workers; it owns its synchronization (one
//! async mutex around the data, saves serialized through it) and every
//! save is a write-to-temp-then-rename so a concurrent reader never
//! observes a torn file.
//!
//! An fs2 advisory lock on a sibling `.lock` file keeps two voxlog
//! processes from interleaving saves against the same state file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

use crate::domain::FileStatus;

/// File name of the persisted state, relative to the output directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// Errors that can occur with the state store
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("state file locked by another process: {0}")]
    Locked(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk shape of the state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateData {
    /// File name → processing status
    #[serde(default)]
    files: HashMap<String, FileStatus>,

    /// SHA-256 fingerprints of entry text already imported into the journal
    #[serde(default)]
    imported: HashSet<String>,
}

/// Summary counts for the status command.
#[derive(Debug, Clone, Default)]
pub struct StoreSummary {
    pub transcribing: usize,
    pub transcribed: usize,
    pub deleted: usize,
    pub imported_entries: usize,
}

impl StoreSummary {
    pub fn total_files(&self) -> usize {
        self.transcribing + self.transcribed + self.deleted
    }
}

/// JSON-file-backed state store with internal synchronization.
pub struct StateStore {
    state_path: PathBuf,
    inner: Mutex<StateData>,

    /// Serializes the fingerprint check → import → record sequence across
    /// workers. Held by the pipeline around the journal-import critical
    /// section, not by the store's own methods.
    import_section: Mutex<()>,

    /// Advisory lock held for the lifetime of the store.
    _lock: std::fs::File,
}

impl StateStore {
    /// Default state file location for a given output directory.
    pub fn default_path(output_dir: &Path) -> PathBuf {
        output_dir.join(STATE_FILE_NAME)
    }

    /// Open (or create) the state store at `state_path`.
    ///
    /// Fails if another process holds the lock, or if an existing state
    /// file cannot be read or parsed — losing track of prior state would
    /// break the at-most-once import guarantee, so this aborts the run.
    pub async fn open(state_path: &Path) -> Result<Self, StateStoreError> {
        let lock_path = state_path.with_extension("json.lock");
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StateStoreError::Locked(state_path.to_path_buf()));
        }

        let data = if fs::try_exists(state_path).await? {
            let content = fs::read_to_string(state_path).await?;
            if content.trim().is_empty() {
                StateData::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            StateData::default()
        };

        Ok(Self {
            state_path: state_path.to_path_buf(),
            inner: Mutex::new(data),
            import_section: Mutex::new(()),
            _lock: lock_file,
        })
    }

    /// Write a snapshot to a sibling temp file, then rename over the state
    /// file. Called with the data mutex held, so saves never interleave.
    async fn persist(&self, data: &StateData) -> Result<(), StateStoreError> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp_path = self.state_path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &self.state_path).await?;
        Ok(())
    }

    /// Current status of a file, or None if never seen.
    pub async fn status_of(&self, file_name: &str) -> Option<FileStatus> {
        self.inner.lock().await.files.get(file_name).copied()
    }

    /// Claim a file for processing: persist `transcribing` before any
    /// expensive work. This is the crash-recovery checkpoint.
    pub async fn claim(&self, file_name: &str) -> Result<(), StateStoreError> {
        self.set(file_name, FileStatus::Transcribing).await
    }

    /// Record the terminal `transcribed` status.
    pub async fn finalize(&self, file_name: &str) -> Result<(), StateStoreError> {
        self.set(file_name, FileStatus::Transcribed).await
    }

    /// Record the terminal `deleted` status (sub-threshold file discarded).
    pub async fn mark_deleted(&self, file_name: &str) -> Result<(), StateStoreError> {
        self.set(file_name, FileStatus::Deleted).await
    }

    async fn set(&self, file_name: &str, status: FileStatus) -> Result<(), StateStoreError> {
        let mut data = self.inner.lock().await;
        data.files.insert(file_name.to_string(), status);
        self.persist(&data).await
    }

    /// Remove a file's record entirely, restoring it to "never seen" so it
    /// is retried on the next run.
    pub async fn revert(&self, file_name: &str) -> Result<(), StateStoreError> {
        let mut data = self.inner.lock().await;
        if data.files.remove(file_name).is_some() {
            self.persist(&data).await?;
        }
        Ok(())
    }

    /// Drop every record still in `transcribing` — evidence of a crashed
    /// run. Returns the affected file names.
    pub async fn recover_interrupted(&self) -> Result<Vec<String>, StateStoreError> {
        let mut data = self.inner.lock().await;
        let stale: Vec<String> = data
            .files
            .iter()
            .filter(|(_, status)| **status == FileStatus::Transcribing)
            .map(|(name, _)| name.clone())
            .collect();

        if !stale.is_empty() {
            for name in &stale {
                data.files.remove(name);
            }
            self.persist(&data).await?;
        }

        Ok(stale)
    }

    /// Guard serializing the fingerprint check-and-insert around a journal
    /// import. Hold the returned guard across `is_imported` → import →
    /// `record_import` so two workers cannot race to import identical
    /// content.
    pub async fn lock_imports(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.import_section.lock().await
    }

    /// Whether an entry with this content fingerprint was already imported.
    pub async fn is_imported(&self, fingerprint: &str) -> bool {
        self.inner.lock().await.imported.contains(fingerprint)
    }

    /// Record a successfully imported content fingerprint. Never removed.
    pub async fn record_import(&self, fingerprint: &str) -> Result<(), StateStoreError> {
        let mut data = self.inner.lock().await;
        data.imported.insert(fingerprint.to_string());
        self.persist(&data).await
    }

    /// Summary counts for the status command.
    pub async fn summary(&self) -> StoreSummary {
        let data = self.inner.lock().await;
        let mut summary = StoreSummary {
            imported_entries: data.imported.len(),
            ..Default::default()
        };
        for status in data.files.values() {
            match status {
                FileStatus::Transcribing => summary.transcribing += 1,
                FileStatus::Transcribed => summary.transcribed += 1,
                FileStatus::Deleted => summary.deleted += 1,
            }
        }
        summary
    }

    /// All tracked files, sorted by name.
    pub async fn entries(&self) -> Vec<(String, FileStatus)> {
        let data = self.inner.lock().await;
        let mut entries: Vec<(String, FileStatus)> = data
            .files
            .iter()
            .map(|(name, status)| (name.clone(), *status))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
