//! One-shot ingestion from the system voice-memo store.
//!
//! Copies recordings modified within the last N days into the pipeline's
//! input directory. Already-present files are not re-copied, so running
//! collect repeatedly is harmless; the pipeline's own state tracking
//! handles everything downstream.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::orchestrator::is_audio_file;

/// Default Voice Memos recordings directory on macOS
pub fn default_voice_memos_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join("Library/Group Containers/group.com.apple.VoiceMemos.shared/Recordings")
}

/// Result of a collection pass
#[derive(Debug, Clone, Default)]
pub struct CollectReport {
    pub copied: usize,
    pub skipped_old: usize,
    pub skipped_existing: usize,
}

impl CollectReport {
    pub fn total_seen(&self) -> usize {
        self.copied + self.skipped_old + self.skipped_existing
    }
}

/// Copy audio files modified within `max_age_days` from `source` into
/// `dest`. Files already present in `dest` (by name) are skipped.
pub async fn collect_recent(
    source: &Path,
    dest: &Path,
    max_age_days: u32,
) -> Result<CollectReport> {
    let cutoff = SystemTime::now() - Duration::from_secs(u64::from(max_age_days) * 86_400);

    tokio::fs::create_dir_all(dest)
        .await
        .with_context(|| format!("Failed to create input directory: {}", dest.display()))?;

    let mut entries = tokio::fs::read_dir(source)
        .await
        .with_context(|| format!("Failed to read source directory: {}", source.display()))?;

    let mut report = CollectReport::default();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_audio_file(&path) {
            continue;
        }

        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let modified = match meta.modified() {
            Ok(t) => t,
            Err(_) => continue,
        };
        if modified < cutoff {
            report.skipped_old += 1;
            continue;
        }

        let target = dest.join(entry.file_name());
        if tokio::fs::try_exists(&target).await? {
            report.skipped_existing += 1;
            continue;
        }

        tokio::fs::copy(&path, &target)
            .await
            .with_context(|| format!("Failed to copy {}", path.display()))?;
        debug!(file = %target.display(), "collected recording");
        report.copied += 1;
    }

    Ok(report)
}
