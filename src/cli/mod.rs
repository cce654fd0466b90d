//! Command-line interface for voxlog.
//!
//! Commands:
//! - `voxlog run` - process the input directory once
//! - `voxlog watch` - keep processing as new recordings appear
//! - `voxlog collect` - pull recent recordings from the voice-memo store
//! - `voxlog status` - show state store summary
//! - `voxlog config` - show resolved configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{Config, Overrides};
use crate::core::{Orchestrator, RunSummary, StateStore};
use crate::ingest::{collect_recent, default_voice_memos_path, InputWatcher};

/// voxlog - voice-memo transcription pipeline with idempotent journal import
#[derive(Parser, Debug)]
#[command(name = "voxlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Configuration flags shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Config file path (defaults to ~/.voxlog/config.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input directory to scan for audio files
    #[arg(short, long, env = "VOXLOG_INPUT_DIR")]
    input: Option<PathBuf>,

    /// Output directory for processed originals and the state file
    #[arg(short, long, env = "VOXLOG_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Day One journal name
    #[arg(short, long, env = "VOXLOG_JOURNAL")]
    journal: Option<String>,

    /// Transcription language code (e.g. "en", "zh")
    #[arg(short, long, env = "VOXLOG_LANGUAGE")]
    language: Option<String>,

    /// Worker pool size
    #[arg(short, long)]
    workers: Option<usize>,

    /// Remove even failed files from the input directory at end of run
    #[arg(long)]
    purge_failed: bool,

    /// OpenAI API key; enables transcript refinement when set
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<Config> {
        Config::load(
            self.config.as_deref(),
            Overrides {
                input_dir: self.input.clone(),
                output_dir: self.output.clone(),
                journal: self.journal.clone(),
                language: self.language.clone(),
                workers: self.workers,
                purge_failed: self.purge_failed,
                openai_api_key: self.openai_api_key.clone(),
            },
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process the input directory once
    Run {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Watch the input directory and process new recordings as they appear
    Watch {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Copy recent recordings from the voice-memo store into the input
    /// directory
    Collect {
        #[command(flatten)]
        config: ConfigArgs,

        /// Source directory (defaults to the system Voice Memos store)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Only copy files modified within this many days
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Show state store summary
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Show resolved configuration
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run { config } => execute_run(&config).await,
            Commands::Watch { config } => execute_watch(&config).await,
            Commands::Collect {
                config,
                source,
                days,
            } => execute_collect(&config, source, days).await,
            Commands::Status { config } => execute_status(&config).await,
            Commands::Config { config } => execute_config(&config).await,
        }
    }
}

/// Process the input directory once
async fn execute_run(args: &ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let orchestrator = Orchestrator::from_config(&config);

    println!("📂 Processing: {}", config.input_dir.display());

    let summary = orchestrator.run().await?;
    print_summary(&summary);

    Ok(())
}

/// Watch mode: run once, then keep running on stable new files
async fn execute_watch(args: &ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let orchestrator = Orchestrator::from_config(&config);

    // The watcher needs the input directory to exist before registering
    tokio::fs::create_dir_all(&config.input_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create input directory: {}",
                config.input_dir.display()
            )
        })?;

    println!("👁️  Watching: {}", config.input_dir.display());
    println!("    Press Ctrl+C to stop");
    println!();

    // Initial pass over whatever is already there
    let initial = orchestrator.run().await?;
    if initial.scanned > 0 {
        print_summary(&initial);
    }

    let watcher = InputWatcher::new(config.input_dir.clone());
    let (mut batch_rx, handle) = watcher.watch().await?;

    // Set up Ctrl+C handler
    let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        let _ = stop_tx.send(());
    });

    loop {
        tokio::select! {
            Some(batch) = batch_rx.recv() => {
                println!("📥 {} new recording(s) detected", batch.len());
                match orchestrator.run().await {
                    Ok(summary) => print_summary(&summary),
                    Err(e) => eprintln!("❌ Run failed: {:#}", e),
                }
            }
            _ = &mut stop_rx => {
                println!();
                println!("🛑 Stopping watcher...");
                handle.stop().await?;
                break;
            }
        }
    }

    Ok(())
}

/// Pull recent recordings into the input directory
async fn execute_collect(
    args: &ConfigArgs,
    source: Option<PathBuf>,
    days: Option<u32>,
) -> Result<()> {
    let config = args.load()?;

    let source = source
        .or(config.collect_source.clone())
        .unwrap_or_else(default_voice_memos_path);
    let days = days.unwrap_or(config.collect_max_age_days);

    println!("📂 Collecting from: {}", source.display());
    println!("   Newer than:      {} day(s)", days);

    let report = collect_recent(&source, &config.input_dir, days).await?;

    println!();
    println!("Collect Results:");
    println!("  Copied:            {}", report.copied);
    println!("  Skipped (old):     {}", report.skipped_old);
    println!("  Skipped (present): {}", report.skipped_existing);

    if report.copied > 0 {
        println!();
        println!("✅ {} new recording(s) in {}", report.copied, config.input_dir.display());
    }

    Ok(())
}

/// Show state store summary
async fn execute_status(args: &ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let state_path = StateStore::default_path(&config.output_dir);

    println!();
    println!("voxlog Status");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Input dir:   {}", config.input_dir.display());
    println!("Output dir:  {}", config.output_dir.display());
    println!("State file:  {}", state_path.display());
    println!();

    if !config.output_dir.exists() {
        println!("⚠️  Output directory does not exist yet; nothing processed so far.");
        return Ok(());
    }

    let store = StateStore::open(&state_path)
        .await
        .context("Failed to open state store")?;
    let summary = store.summary().await;

    println!("Tracked files:");
    println!("  Transcribing: {}", summary.transcribing);
    println!("  Transcribed:  {}", summary.transcribed);
    println!("  Deleted:      {}", summary.deleted);
    println!("  Total:        {}", summary.total_files());
    println!();
    println!("Imported entries: {}", summary.imported_entries);

    let entries = store.entries().await;
    if !entries.is_empty() {
        println!();
        println!("Recent:");
        for (name, status) in entries.iter().rev().take(10) {
            let status_str = match status {
                crate::domain::FileStatus::Transcribing => "PROC",
                crate::domain::FileStatus::Transcribed => "DONE",
                crate::domain::FileStatus::Deleted => "DEL ",
            };
            println!("  [{}] {}", status_str, name);
        }
    }

    println!();

    if summary.transcribing > 0 {
        println!("⚠️  {} file(s) still marked transcribing (interrupted run);", summary.transcribing);
        println!("    they will be retried on the next run.");
    }

    Ok(())
}

/// Show resolved configuration
async fn execute_config(args: &ConfigArgs) -> Result<()> {
    let config = args.load()?;

    println!();
    println!("voxlog Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Input dir:    {}", config.input_dir.display());
    println!("Output dir:   {}", config.output_dir.display());
    println!("Journal:      {}", config.journal);
    println!("Language:     {}", config.language);
    println!("Workers:      {}", config.workers);
    println!("Purge failed: {}", config.purge_failed);
    println!();
    println!("Whisper:      {} ({})", config.whisper.binary, config.whisper.model);
    if let Some(device) = &config.whisper.device {
        println!("Device:       {}", device);
    }
    println!("ffmpeg:       {}", config.ffmpeg_binary);
    println!("Day One:      {}", config.dayone_binary);
    match &config.refiner {
        Some(refiner) => println!("Refiner:      {} via {}", refiner.model, refiner.endpoint),
        None => println!("Refiner:      disabled (no API key)"),
    }
    println!();

    if config.input_dir.exists() {
        println!("✓ Input directory exists");
    } else {
        println!("⚠️  Input directory does not exist");
    }
    if config.output_dir.exists() {
        println!("✓ Output directory exists");
    } else {
        println!("ℹ️  Output directory will be created on first run");
    }

    Ok(())
}

/// Print the per-run tallies
fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run Summary:");
    println!("  Scanned:     {}", summary.scanned);
    println!("  Transcribed: {}", summary.transcribed);
    println!("  Imported:    {}", summary.imported);
    println!("  Deleted:     {}", summary.deleted);
    println!("  Skipped:     {}", summary.skipped);
    println!("  Failed:      {}", summary.failed);

    if summary.import_failures > 0 {
        println!();
        println!(
            "⚠️  {} entry(ies) transcribed but not imported (see log)",
            summary.import_failures
        );
    }

    if !summary.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &summary.failures {
            println!("  [{}] {}: {}", failure.stage, failure.file, failure.error);
        }
    }

    println!();
}
