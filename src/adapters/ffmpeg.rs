//! ffmpeg-backed metadata extraction and audio normalization.
//!
//! Both adapters shell out to ffmpeg. Metadata comes from the stderr of a
//! bare `ffmpeg -i <file>` probe (ffmpeg prints the container metadata
//! there and exits non-zero without an output file, which is expected).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tokio::process::Command;

use super::{AudioNormalizer, MetadataExtractor};

/// Extracts `creation_time` from ffmpeg's container-metadata dump.
pub struct FfmpegMetadata {
    binary: String,
}

impl FfmpegMetadata {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Parse the first `creation_time : <ISO timestamp>` line out of an
/// ffmpeg probe dump. The recorded value is UTC; the result is converted
/// to local time.
fn parse_creation_time(probe_output: &str) -> Option<DateTime<Local>> {
    for line in probe_output.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("creation_time") {
            continue;
        }
        let (_, value) = trimmed.split_once(':')?;
        let value = value.trim();
        // Keep the leading "%Y-%m-%dT%H:%M:%S" and drop fractional
        // seconds / zone suffix ffmpeg appends.
        let head = match value.get(..19) {
            Some(head) => head,
            None => continue,
        };
        if let Ok(naive) = NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S") {
            let utc = Utc.from_utc_datetime(&naive);
            return Some(utc.with_timezone(&Local));
        }
    }
    None
}

#[async_trait]
impl MetadataExtractor for FfmpegMetadata {
    async fn creation_time(&self, audio_path: &Path) -> Result<Option<DateTime<Local>>> {
        let output = Command::new(&self.binary)
            .arg("-i")
            .arg(audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {} probe", self.binary))?;

        // ffmpeg exits non-zero when no output file is given; the metadata
        // dump on stderr is still complete.
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(parse_creation_time(&stderr))
    }
}

/// Converts `.m4a` sources to `.wav` before transcription.
pub struct FfmpegNormalizer {
    binary: String,
}

impl FfmpegNormalizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    fn needs_normalization(&self, audio_path: &Path) -> bool {
        audio_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("m4a"))
            .unwrap_or(false)
    }

    async fn normalize(&self, audio_path: &Path) -> Result<PathBuf> {
        let wav_path = audio_path.with_extension("wav");

        // A leftover conversion from an earlier attempt is reused as-is.
        if tokio::fs::try_exists(&wav_path).await.unwrap_or(false) {
            tracing::debug!(path = %wav_path.display(), "converted file already exists, skipping conversion");
            return Ok(wav_path);
        }

        let output = Command::new(&self.binary)
            .arg("-nostdin")
            .arg("-y")
            .arg("-i")
            .arg(audio_path)
            .arg(&wav_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {} conversion", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Conversion of {} failed with exit code {}: {}",
                audio_path.display(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(wav_path)
    }
}
