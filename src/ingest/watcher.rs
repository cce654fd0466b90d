//! Input-directory watcher for watch mode.
//!
//! Watches the input directory for new audio files and emits a batch once
//! the files are stable (size unchanged for the stability delay), so a
//! pipeline pass never starts on a half-copied recording.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::orchestrator::is_audio_file;

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory to watch (the pipeline input directory)
    pub input_dir: PathBuf,

    /// How long a file's size must be unchanged before it counts as stable
    pub stability_delay_secs: u64,
}

impl WatcherConfig {
    pub fn new(input_dir: PathBuf) -> Self {
        Self {
            input_dir,
            stability_delay_secs: 5,
        }
    }

    /// Check that the watch directory exists
    pub fn validate(&self) -> Result<(), WatcherError> {
        if !self.input_dir.exists() {
            return Err(WatcherError::DirectoryNotFound(self.input_dir.clone()));
        }
        Ok(())
    }
}

/// Input-directory watcher with stability checking
pub struct InputWatcher {
    config: WatcherConfig,
}

impl InputWatcher {
    pub fn new(input_dir: PathBuf) -> Self {
        Self {
            config: WatcherConfig::new(input_dir),
        }
    }

    pub fn with_config(config: WatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Watch the input directory and emit batches of stable new audio
    /// files. Runs until stopped via the returned handle.
    pub async fn watch(&self) -> Result<(mpsc::Receiver<Vec<PathBuf>>, WatchHandle)> {
        self.config.validate()?;

        let (batch_tx, batch_rx) = mpsc::channel::<Vec<PathBuf>>(16);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let config = self.config.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = run_watcher(config, batch_tx, &mut stop_rx).await {
                tracing::error!("Watcher error: {}", e);
            }
        });

        Ok((batch_rx, WatchHandle { stop_tx, task }))
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

/// Internal watcher loop
async fn run_watcher(
    config: WatcherConfig,
    batch_tx: mpsc::Sender<Vec<PathBuf>>,
    stop_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    // Files being stabilized: path → (last size, last change seen)
    let mut pending: HashMap<PathBuf, (u64, Instant)> = HashMap::new();

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_secs(2), tx)?;
    debouncer
        .watcher()
        .watch(&config.input_dir, RecursiveMode::NonRecursive)?;

    let stability_delay = Duration::from_secs(config.stability_delay_secs);

    tracing::info!("Watching {} for audio files", config.input_dir.display());

    loop {
        if stop_rx.try_recv().is_ok() {
            tracing::info!("Watcher stopping...");
            break;
        }

        // Pull file events (non-blocking with timeout)
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(events)) => {
                for event in events {
                    let path = event.path;
                    if !is_audio_file(&path) {
                        continue;
                    }
                    if let Ok(metadata) = std::fs::metadata(&path) {
                        if metadata.is_file() {
                            pending.insert(path, (metadata.len(), Instant::now()));
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Watcher error: {:?}", e);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                // Expected - continue to stability check
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        }

        // Partition pending files into stable, changed, and gone
        let now = Instant::now();
        let mut stable = Vec::new();
        let mut changed = Vec::new();
        let mut gone = Vec::new();

        for (path, (last_size, last_seen)) in pending.iter() {
            if now.duration_since(*last_seen) < stability_delay {
                continue;
            }
            match std::fs::metadata(path) {
                Ok(metadata) => {
                    let current = metadata.len();
                    if current == *last_size && current > 0 {
                        stable.push(path.clone());
                    } else {
                        changed.push((path.clone(), current));
                    }
                }
                Err(_) => gone.push(path.clone()),
            }
        }

        for (path, size) in changed {
            pending.insert(path, (size, now));
        }
        for path in gone {
            pending.remove(&path);
        }

        if !stable.is_empty() {
            for path in &stable {
                pending.remove(path);
                tracing::info!("New audio file stable: {}", path.display());
            }
            if batch_tx.send(stable).await.is_err() {
                // Receiver dropped, nothing left to notify
                break;
            }
        }

        // Small sleep to prevent busy loop
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}
