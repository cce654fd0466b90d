//! Configuration for the voxlog pipeline.
//!
//! Sources (highest priority first):
//! 1. CLI flags and environment variables (parsed by clap)
//! 2. Config file (~/.voxlog/config.yaml, or --config)
//! 3. Defaults
//!
//! Everything resolves into one explicit `Config` that is passed into the
//! orchestrator and adapters; there is no ambient/global state.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_JOURNAL: &str = "Journal";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_WHISPER_BINARY: &str = "insanely-fast-whisper";
pub const DEFAULT_WHISPER_MODEL: &str = "openai/whisper-small";
pub const DEFAULT_REFINER_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_REFINER_MODEL: &str = "gpt-4";
pub const DEFAULT_COLLECT_MAX_AGE_DAYS: u32 = 3;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub journal: Option<String>,
    pub language: Option<String>,
    pub workers: Option<usize>,
    pub purge_failed: Option<bool>,
    #[serde(default)]
    pub whisper: WhisperSection,
    #[serde(default)]
    pub refiner: RefinerSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub collect: CollectSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhisperSection {
    pub binary: Option<String>,
    pub model: Option<String>,
    pub device: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefinerSection {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsSection {
    pub ffmpeg: Option<String>,
    pub dayone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectSection {
    pub source_dir: Option<PathBuf>,
    pub max_age_days: Option<u32>,
}

/// Values supplied on the command line (or via env), overriding the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub journal: Option<String>,
    pub language: Option<String>,
    pub workers: Option<usize>,
    pub purge_failed: bool,
    pub openai_api_key: Option<String>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for audio files
    pub input_dir: PathBuf,

    /// Directory receiving processed originals and the state file
    pub output_dir: PathBuf,

    /// Target Day One journal name
    pub journal: String,

    /// Transcription language code
    pub language: String,

    /// Worker pool size
    pub workers: usize,

    /// Remove even failed files from the input directory at end of run
    pub purge_failed: bool,

    pub whisper: WhisperConfig,

    /// Present only when a refiner credential is configured
    pub refiner: Option<RefinerConfig>,

    pub ffmpeg_binary: String,
    pub dayone_binary: String,

    /// Source directory for the collect command (defaults to the system
    /// voice-memo store when unset)
    pub collect_source: Option<PathBuf>,
    pub collect_max_age_days: u32,
}

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub binary: String,
    pub model: String,
    pub device: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefinerConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
}

/// Default config file location (~/.voxlog/config.yaml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".voxlog").join("config.yaml"))
}

/// Load and parse a config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

impl Config {
    /// Load the config file (explicit path, or the default if present) and
    /// resolve it against CLI overrides and defaults.
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => load_config_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => load_config_file(&path)?,
                _ => ConfigFile::default(),
            },
        };

        Self::resolve(file, overrides)
    }

    /// Merge a parsed config file with overrides into a resolved `Config`.
    pub fn resolve(file: ConfigFile, overrides: Overrides) -> Result<Self> {
        let input_dir = overrides
            .input_dir
            .or(file.input_dir)
            .context("input directory not configured (use --input or set input_dir in the config file)")?;

        let output_dir = overrides
            .output_dir
            .or(file.output_dir)
            .context("output directory not configured (use --output or set output_dir in the config file)")?;

        let refiner_key = overrides.openai_api_key.or(file.refiner.api_key);
        let refiner = refiner_key.map(|api_key| RefinerConfig {
            api_key,
            endpoint: file
                .refiner
                .endpoint
                .unwrap_or_else(|| DEFAULT_REFINER_ENDPOINT.to_string()),
            model: file
                .refiner
                .model
                .unwrap_or_else(|| DEFAULT_REFINER_MODEL.to_string()),
        });

        Ok(Self {
            input_dir,
            output_dir,
            journal: overrides
                .journal
                .or(file.journal)
                .unwrap_or_else(|| DEFAULT_JOURNAL.to_string()),
            language: overrides
                .language
                .or(file.language)
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            workers: overrides
                .workers
                .or(file.workers)
                .unwrap_or(DEFAULT_WORKERS)
                .max(1),
            purge_failed: overrides.purge_failed || file.purge_failed.unwrap_or(false),
            whisper: WhisperConfig {
                binary: file
                    .whisper
                    .binary
                    .unwrap_or_else(|| DEFAULT_WHISPER_BINARY.to_string()),
                model: file
                    .whisper
                    .model
                    .unwrap_or_else(|| DEFAULT_WHISPER_MODEL.to_string()),
                device: file.whisper.device,
            },
            refiner,
            ffmpeg_binary: file.tools.ffmpeg.unwrap_or_else(|| "ffmpeg".to_string()),
            dayone_binary: file.tools.dayone.unwrap_or_else(|| "dayone2".to_string()),
            collect_source: file.collect.source_dir,
            collect_max_age_days: file
                .collect
                .max_age_days
                .unwrap_or(DEFAULT_COLLECT_MAX_AGE_DAYS),
        })
    }
}
