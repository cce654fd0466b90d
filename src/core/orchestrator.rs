//! Pipeline orchestrator.
//!
//! Enumerates candidate audio files, runs the per-file state machine on a
//! bounded worker pool, waits for every worker (the sweep must never race a
//! live worker), reverts claims for failed files, and performs the terminal
//! input-directory sweep.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::adapters::AdapterSet;
use crate::config::Config;
use crate::core::pipeline::{process_file, PipelineContext};
use crate::core::state_store::StateStore;
use crate::domain::FileOutcome;

/// Recognized audio extensions
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "ogg", "flac"];

/// Check if a path carries a recognized audio extension
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Settings for one orchestrator run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub language: String,
    pub workers: usize,

    /// Remove even failed files during the terminal sweep (the original
    /// scratch-directory-must-end-empty behavior). Off by default so a
    /// transcription failure leaves the source in place for retry.
    pub purge_failed: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            input_dir: config.input_dir.clone(),
            output_dir: config.output_dir.clone(),
            language: config.language.clone(),
            workers: config.workers,
            purge_failed: config.purge_failed,
        }
    }
}

/// One failed file, for the run summary
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub file: String,
    pub stage: String,
    pub error: String,
}

/// Tallies for a completed run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub scanned: usize,
    pub transcribed: usize,
    pub imported: usize,
    pub import_failures: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub swept: usize,
    pub failures: Vec<FailureReport>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    options: RunOptions,
    adapters: AdapterSet,
}

impl Orchestrator {
    pub fn new(options: RunOptions, adapters: AdapterSet) -> Self {
        Self { options, adapters }
    }

    /// Build an orchestrator with production adapters from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(RunOptions::from_config(config), AdapterSet::from_config(config))
    }

    /// Execute one pipeline pass over the input directory.
    ///
    /// Setup failures (output directory, state store) abort the run;
    /// everything per-file is contained in the file's outcome.
    pub async fn run(&self) -> Result<RunSummary> {
        let opts = &self.options;

        tokio::fs::create_dir_all(&opts.output_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create output directory: {}",
                    opts.output_dir.display()
                )
            })?;

        let store = Arc::new(
            StateStore::open(&StateStore::default_path(&opts.output_dir))
                .await
                .context("Failed to open state store")?,
        );

        // Crash recovery: drop claims left behind by an interrupted run so
        // those files are reconsidered from scratch
        let recovered = store
            .recover_interrupted()
            .await
            .context("Failed to recover interrupted records")?;
        for name in &recovered {
            warn!(file = %name, "dropped interrupted claim from a previous run");
        }

        let files = self.enumerate().await?;
        let mut summary = RunSummary {
            scanned: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            info!(input = %opts.input_dir.display(), "no audio files found");
            return Ok(summary);
        }

        let workers = opts.workers.max(1);
        info!(
            count = files.len(),
            workers,
            "processing input directory"
        );

        let ctx = Arc::new(PipelineContext {
            store: store.clone(),
            adapters: self.adapters.clone(),
            output_dir: opts.output_dir.clone(),
            language: opts.language.clone(),
        });

        // Bounded pool: at most `workers` tasks in flight. The JoinSet is
        // drained as a sliding window while spawning, then fully drained as
        // the end-of-run barrier.
        let mut tasks: JoinSet<(String, PathBuf, FileOutcome)> = JoinSet::new();
        let mut outcomes: Vec<(String, PathBuf, FileOutcome)> = Vec::with_capacity(files.len());

        for path in &files {
            while tasks.len() >= workers {
                if let Some(joined) = tasks.join_next().await {
                    collect_outcome(joined, &mut outcomes, &mut summary);
                }
            }

            let ctx = ctx.clone();
            let path = path.clone();
            tasks.spawn(async move {
                let name = path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                let outcome = process_file(&ctx, &path).await;
                (name, path, outcome)
            });
        }

        // Barrier: the sweep must only run after every worker has finished
        while let Some(joined) = tasks.join_next().await {
            collect_outcome(joined, &mut outcomes, &mut summary);
        }

        // Tally outcomes and revert claims for failed files
        for (name, _path, outcome) in &outcomes {
            match outcome {
                FileOutcome::Skipped { .. } => summary.skipped += 1,
                FileOutcome::Deleted => summary.deleted += 1,
                FileOutcome::Transcribed {
                    imported,
                    import_failed,
                } => {
                    summary.transcribed += 1;
                    if *imported {
                        summary.imported += 1;
                    }
                    if *import_failed {
                        summary.import_failures += 1;
                    }
                }
                FileOutcome::Failed {
                    stage,
                    claimed,
                    error,
                } => {
                    summary.failed += 1;
                    summary.failures.push(FailureReport {
                        file: name.clone(),
                        stage: stage.label().to_string(),
                        error: error.clone(),
                    });
                    warn!(file = %name, stage = %stage, error = %error, "file processing failed");

                    if *claimed {
                        if let Err(e) = store.revert(name).await {
                            // The stale claim will be dropped by the
                            // recovery sweep on the next run
                            error!(file = %name, error = %e, "failed to revert claim");
                        }
                    }
                }
            }
        }

        self.sweep(&outcomes, &mut summary).await;

        info!(
            transcribed = summary.transcribed,
            imported = summary.imported,
            deleted = summary.deleted,
            skipped = summary.skipped,
            failed = summary.failed,
            "run complete"
        );

        Ok(summary)
    }

    /// Enumerate audio files in the input directory
    async fn enumerate(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.options.input_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to read input directory: {}",
                    self.options.input_dir.display()
                )
            })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_audio_file(&path) {
                continue;
            }
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => files.push(path),
                _ => {}
            }
        }

        files.sort();
        Ok(files)
    }

    /// Terminal sweep: remove enumerated files still sitting in the input
    /// directory. Files whose processing failed are left for retry unless
    /// `purge_failed` is set.
    async fn sweep(&self, outcomes: &[(String, PathBuf, FileOutcome)], summary: &mut RunSummary) {
        for (name, path, outcome) in outcomes {
            if outcome.is_failure() && !self.options.purge_failed {
                debug!(file = %name, "leaving failed file in place for retry");
                continue;
            }

            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    summary.swept += 1;
                    debug!(file = %name, "removed from input directory");
                }
                // Already moved to the output directory or deleted by the
                // size gate
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(file = %name, error = %e, "failed to remove file during sweep");
                }
            }
        }
    }
}

/// Fold one joined task into the outcome list. A panicked worker counts as
/// a failure but never aborts siblings or the run.
fn collect_outcome(
    joined: Result<(String, PathBuf, FileOutcome), JoinError>,
    outcomes: &mut Vec<(String, PathBuf, FileOutcome)>,
    summary: &mut RunSummary,
) {
    match joined {
        Ok(result) => outcomes.push(result),
        Err(e) => {
            error!(error = %e, "worker task failed");
            summary.failed += 1;
            summary.failures.push(FailureReport {
                file: "<unknown>".to_string(),
                stage: "worker".to_string(),
                error: e.to_string(),
            });
        }
    }
}
