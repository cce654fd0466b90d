//! Day One journal import.
//!
//! Spawns `dayone2 new --date <ts> --journal <name>` and pipes the entry
//! text to stdin. The importer is intentionally dumb: content
//! deduplication happens in the pipeline core, keyed by fingerprint.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::JournalImporter;

/// Date format dayone2 accepts on --date
const IMPORT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// CLI-based Day One importer
pub struct DayOneImporter {
    binary: String,
    journal: String,
}

impl DayOneImporter {
    pub fn new(binary: impl Into<String>, journal: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            journal: journal.into(),
        }
    }
}

#[async_trait]
impl JournalImporter for DayOneImporter {
    async fn import(&self, content: &str, date: DateTime<Local>) -> Result<()> {
        let date_str = date.format(IMPORT_DATE_FORMAT).to_string();

        let mut child = Command::new(&self.binary)
            .arg("new")
            .arg("--date")
            .arg(&date_str)
            .arg("--journal")
            .arg(&self.journal)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary))?;

        // Write entry to stdin, then drop it to signal EOF
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content.as_bytes())
                .await
                .context("Failed to write entry to importer stdin")?;
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Journal import into '{}' failed with exit code {}: {}",
                self.journal,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(())
    }
}
