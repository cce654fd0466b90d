//! Whisper transcription backend.
//!
//! Shells out to an insanely-fast-whisper-style CLI that writes a JSON
//! transcript to a caller-supplied path. Each call uses its own temp
//! directory for the transcript so concurrent workers never collide.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::Transcriber;
use crate::config::WhisperConfig;

/// Transcript JSON structure written by the whisper CLI
#[derive(Debug, Deserialize)]
struct TranscriptFile {
    #[serde(default)]
    text: String,
}

/// Subprocess transcriber
pub struct WhisperTranscriber {
    config: WhisperConfig,
}

impl WhisperTranscriber {
    pub fn new(config: WhisperConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<String> {
        let temp_dir = tempfile::tempdir().context("Failed to create transcript temp dir")?;
        let transcript_path = temp_dir.path().join("transcript.json");

        let mut command = Command::new(&self.config.binary);
        command
            .arg("--file-name")
            .arg(audio_path)
            .arg("--language")
            .arg(language)
            .arg("--model-name")
            .arg(&self.config.model)
            .arg("--transcript-path")
            .arg(&transcript_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(device) = &self.config.device {
            command.arg("--device-id").arg(device);
        }

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Transcription of {} failed with exit code {}: {}",
                audio_path.display(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let json_content = tokio::fs::read_to_string(&transcript_path)
            .await
            .context("Failed to read transcript output")?;

        let transcript: TranscriptFile =
            serde_json::from_str(&json_content).context("Failed to parse transcript JSON")?;

        Ok(transcript.text.trim().to_string())
    }
}
