//! Shared test doubles for the pipeline collaborators.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use tokio::sync::Mutex;

use voxlog::adapters::{
    AdapterSet, AudioNormalizer, JournalImporter, MetadataExtractor, TextRefiner, Transcriber,
};

/// Timestamp every test recording pretends to carry
pub fn fixed_timestamp() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

/// Metadata extractor returning a fixed timestamp (or none)
pub struct FixedMetadata(pub Option<DateTime<Local>>);

#[async_trait]
impl MetadataExtractor for FixedMetadata {
    async fn creation_time(&self, _audio_path: &Path) -> Result<Option<DateTime<Local>>> {
        Ok(self.0)
    }
}

/// Normalizer that never converts anything
pub struct NoopNormalizer;

#[async_trait]
impl AudioNormalizer for NoopNormalizer {
    fn needs_normalization(&self, _audio_path: &Path) -> bool {
        false
    }

    async fn normalize(&self, audio_path: &Path) -> Result<PathBuf> {
        Ok(audio_path.to_path_buf())
    }
}

/// Normalizer converting .m4a by copying the bytes to a .wav sibling
pub struct CopyNormalizer;

#[async_trait]
impl AudioNormalizer for CopyNormalizer {
    fn needs_normalization(&self, audio_path: &Path) -> bool {
        audio_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("m4a"))
            .unwrap_or(false)
    }

    async fn normalize(&self, audio_path: &Path) -> Result<PathBuf> {
        let wav_path = audio_path.with_extension("wav");
        tokio::fs::copy(audio_path, &wav_path).await?;
        Ok(wav_path)
    }
}

/// Scripted transcriber with call counting, failure injection, and
/// concurrency tracking
pub struct MockTranscriber {
    pub text: String,
    pub fail_all: bool,
    /// Fail only for paths containing this marker
    pub fail_marker: Option<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl MockTranscriber {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            fail_all: false,
            fail_marker: None,
            delay: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_all: true,
            ..Self::unwrapped_returning("")
        })
    }

    pub fn failing_for(marker: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_marker: Some(marker.to_string()),
            ..Self::unwrapped_returning(text)
        })
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::unwrapped_returning(text)
        })
    }

    fn unwrapped_returning(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail_all: false,
            fail_marker: None,
            delay: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio_path: &Path, _language: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_all {
            anyhow::bail!("transcription backend unavailable");
        }
        if let Some(marker) = &self.fail_marker {
            if audio_path.to_string_lossy().contains(marker.as_str()) {
                anyhow::bail!("transcription failed for {}", audio_path.display());
            }
        }

        Ok(self.text.clone())
    }
}

/// Refiner wrapping its input, or failing
pub struct MockRefiner {
    pub fail: bool,
}

#[async_trait]
impl TextRefiner for MockRefiner {
    async fn refine(&self, text: &str) -> Result<String> {
        if self.fail {
            anyhow::bail!("refinement backend unavailable");
        }
        Ok(format!("refined: {}", text.lines().last().unwrap_or("")))
    }
}

/// Importer recording every accepted entry
pub struct MockImporter {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub entries: Mutex<Vec<(String, DateTime<Local>)>>,
}

impl MockImporter {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JournalImporter for MockImporter {
    async fn import(&self, content: &str, date: DateTime<Local>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("journal backend unavailable");
        }
        self.entries
            .lock()
            .await
            .push((content.to_string(), date));
        Ok(())
    }
}

/// Adapter set wired to the given transcriber and importer, with fixed
/// metadata, no conversion, and no refiner
pub fn adapter_set(transcriber: Arc<MockTranscriber>, importer: Arc<MockImporter>) -> AdapterSet {
    AdapterSet {
        metadata: Arc::new(FixedMetadata(Some(fixed_timestamp()))),
        normalizer: Arc::new(NoopNormalizer),
        transcriber,
        refiner: None,
        importer,
    }
}

/// A recording big enough to pass the size gate (200 KiB)
pub async fn write_large_audio(path: &Path) {
    tokio::fs::write(path, vec![0u8; 200 * 1024]).await.unwrap();
}

/// A recording below the size gate (2 KiB)
pub async fn write_small_audio(path: &Path) {
    tokio::fs::write(path, vec![0u8; 2 * 1024]).await.unwrap();
}
