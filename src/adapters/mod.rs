//! Collaborator interfaces for external tools.
//!
//! The pipeline core treats metadata extraction, audio conversion,
//! transcription, text refinement, and journal import as external
//! collaborators behind narrow traits. Production implementations shell
//! out to ffmpeg, a whisper CLI, and dayone2, or call an OpenAI-compatible
//! HTTP endpoint; tests substitute in-memory doubles.

pub mod dayone;
pub mod ffmpeg;
pub mod openai;
pub mod whisper;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::config::Config;

pub use dayone::DayOneImporter;
pub use ffmpeg::{FfmpegMetadata, FfmpegNormalizer};
pub use openai::OpenAiRefiner;
pub use whisper::WhisperTranscriber;

/// Derives a creation timestamp from a media file.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Ok(None) means the file carries no parseable creation time; the
    /// caller falls back to the current wall clock. Errors are treated
    /// the same way — a missing timestamp is never fatal.
    async fn creation_time(&self, audio_path: &Path) -> Result<Option<DateTime<Local>>>;
}

/// Converts an input audio file to the canonical intermediate format.
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    /// Whether this source format requires conversion before transcription.
    fn needs_normalization(&self, audio_path: &Path) -> bool;

    /// Convert and return the path of the canonical-format file.
    async fn normalize(&self, audio_path: &Path) -> Result<PathBuf>;
}

/// Converts audio into raw text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<String>;
}

/// Rewrites raw transcribed text for fluency.
#[async_trait]
pub trait TextRefiner: Send + Sync {
    async fn refine(&self, text: &str) -> Result<String>;
}

/// Persists a dated text entry into the journaling store. Deduplication is
/// the core's responsibility, not this collaborator's.
#[async_trait]
pub trait JournalImporter: Send + Sync {
    async fn import(&self, content: &str, date: DateTime<Local>) -> Result<()>;
}

/// The full set of collaborators a pipeline run needs.
#[derive(Clone)]
pub struct AdapterSet {
    pub metadata: Arc<dyn MetadataExtractor>,
    pub normalizer: Arc<dyn AudioNormalizer>,
    pub transcriber: Arc<dyn Transcriber>,

    /// Refinement is optional dependency injection: absent means the raw
    /// transcript is used as-is.
    pub refiner: Option<Arc<dyn TextRefiner>>,

    pub importer: Arc<dyn JournalImporter>,
}

impl AdapterSet {
    /// Build the production adapters from resolved configuration.
    pub fn from_config(config: &Config) -> Self {
        let refiner = config
            .refiner
            .as_ref()
            .map(|rc| Arc::new(OpenAiRefiner::new(rc.clone())) as Arc<dyn TextRefiner>);

        Self {
            metadata: Arc::new(FfmpegMetadata::new(&config.ffmpeg_binary)),
            normalizer: Arc::new(FfmpegNormalizer::new(&config.ffmpeg_binary)),
            transcriber: Arc::new(WhisperTranscriber::new(config.whisper.clone())),
            refiner,
            importer: Arc::new(DayOneImporter::new(
                &config.dayone_binary,
                &config.journal,
            )),
        }
    }
}
