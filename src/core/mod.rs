//! Core orchestration logic.
//!
//! - `state_store`: persistent per-file status + imported-content fingerprints
//! - `pipeline`: the per-file state machine
//! - `orchestrator`: enumeration, worker pool, terminal sweep

pub mod orchestrator;
pub mod pipeline;
pub mod state_store;

pub use orchestrator::{Orchestrator, RunOptions, RunSummary};
pub use pipeline::{fingerprint, process_file, sanitize_file_name, PipelineContext};
pub use state_store::{StateStore, StateStoreError, StoreSummary};
