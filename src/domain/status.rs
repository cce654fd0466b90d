//! Persisted processing status of a tracked recording.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Processing status of a recording, keyed by file name in the state store.
///
/// Absence from the store means the file has never been seen. `Transcribing`
/// is a crash-recovery checkpoint, not a terminal state: a record still in
/// `Transcribing` at startup belongs to an interrupted run and is dropped so
/// the file is reconsidered from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Claimed by a worker; expensive work is in progress
    Transcribing,

    /// Fully processed and moved to the output directory
    Transcribed,

    /// Below the size threshold; source file was discarded
    Deleted,
}

impl FileStatus {
    /// Terminal statuses are skipped on subsequent runs.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transcribed | Self::Deleted)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transcribing => "transcribing",
            Self::Transcribed => "transcribed",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}
