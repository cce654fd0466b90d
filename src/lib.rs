//! voxlog - voice-memo transcription pipeline
//!
//! Watches a folder of voice-memo recordings, transcribes each one with a
//! local whisper-style CLI, optionally rewrites the transcript with a
//! language model, and imports the result into a Day One journal —
//! exactly once per recording and once per distinct entry text, across
//! retries, crashes, and concurrent workers.
//!
//! # Architecture
//!
//! The core is an idempotent per-file state machine backed by a persistent
//! state store:
//! - A file is claimed (`transcribing`) before any expensive work, so a
//!   crash can always be recovered by dropping the claim
//! - Terminal states (`transcribed`, `deleted`) make reruns no-ops
//! - Journal entries are deduplicated by a stable SHA-256 content
//!   fingerprint, persisted across runs
//!
//! External tools (ffmpeg, whisper CLI, dayone2, an OpenAI-compatible
//! endpoint) sit behind narrow adapter traits.
//!
//! # Modules
//!
//! - `adapters`: External collaborator interfaces and implementations
//! - `core`: Orchestration logic (StateStore, per-file pipeline, worker pool)
//! - `domain`: Data structures (FileStatus, FileOutcome)
//! - `ingest`: Collecting recordings and watching the input directory
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Pull recent recordings from the voice-memo store
//! voxlog collect -i ~/VoiceJournal -o ~/VoiceJournal/processed
//!
//! # Process everything in the input directory once
//! voxlog run -i ~/VoiceJournal -o ~/VoiceJournal/processed -j Diary
//!
//! # Keep watching for new recordings
//! voxlog watch -i ~/VoiceJournal -o ~/VoiceJournal/processed
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use crate::core::{Orchestrator, RunOptions, RunSummary, StateStore};
pub use adapters::AdapterSet;
pub use config::Config;
pub use domain::{FileOutcome, FileStatus, Stage};

// Ingestion
pub use ingest::{collect_recent, InputWatcher, WatcherConfig};
