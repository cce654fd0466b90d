//! Per-file processing state machine.
//!
//! Drives one audio file through: lookup → size gate → claim → timestamp →
//! normalize → transcribe → refine → materialize → import → cleanup →
//! finalize. Every transition is persisted through the state store, and the
//! `transcribing` claim lands *before* any expensive or destructive work so
//! a crash can always be recovered by dropping the claim.
//!
//! Failures are reported through `FileOutcome`, never propagated: the
//! orchestrator reverts claimed records and keeps sibling workers running.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::adapters::AdapterSet;
use crate::core::state_store::StateStore;
use crate::domain::{FileOutcome, Stage};

/// Files below this size are treated as accidental recordings and
/// discarded without transcription.
pub const MIN_AUDIO_BYTES: u64 = 100 * 1024;

/// Timestamp prefixed to the entry body
const ENTRY_HEADER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp prefix of the intermediate artifact file name
const ARTIFACT_TS_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Everything a worker needs to process one file. Shared across the pool;
/// the state store is the only member with interior mutability.
pub struct PipelineContext {
    pub store: Arc<StateStore>,
    pub adapters: AdapterSet,
    pub output_dir: PathBuf,
    pub language: String,
}

/// Failure at a specific stage, aborting this file only.
struct StageError {
    stage: Stage,
    message: String,
}

fn stage_err(stage: Stage, err: impl Into<anyhow::Error>) -> StageError {
    StageError {
        stage,
        message: format!("{:#}", err.into()),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Run the state machine for one file.
#[instrument(skip(ctx, audio_path), fields(file = %audio_path.display()))]
pub async fn process_file(ctx: &PipelineContext, audio_path: &Path) -> FileOutcome {
    let name = file_name_of(audio_path);

    // 1. Lookup: terminal records are an idempotent no-op
    if let Some(status) = ctx.store.status_of(&name).await {
        if status.is_terminal() {
            debug!(%status, "already processed, skipping");
            return FileOutcome::Skipped { status };
        }
    }

    // 2. Size gate: very short recordings are accidental
    let size = match tokio::fs::metadata(audio_path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            let err = stage_err(Stage::Inspect, e);
            return FileOutcome::Failed {
                stage: err.stage,
                claimed: false,
                error: err.message,
            };
        }
    };
    if size < MIN_AUDIO_BYTES {
        info!(size, "below size threshold, discarding");
        let discarded = async {
            tokio::fs::remove_file(audio_path).await?;
            Ok::<(), anyhow::Error>(ctx.store.mark_deleted(&name).await?)
        }
        .await;
        return match discarded {
            Ok(()) => FileOutcome::Deleted,
            Err(e) => {
                let err = stage_err(Stage::Inspect, e);
                FileOutcome::Failed {
                    stage: err.stage,
                    claimed: false,
                    error: err.message,
                }
            }
        };
    }

    // 3. Claim: persist `transcribing` before any expensive work
    if let Err(e) = ctx.store.claim(&name).await {
        let err = stage_err(Stage::Claim, e);
        return FileOutcome::Failed {
            stage: err.stage,
            claimed: false,
            error: err.message,
        };
    }

    match run_claimed(ctx, audio_path, &name).await {
        Ok((imported, import_failed)) => FileOutcome::Transcribed {
            imported,
            import_failed,
        },
        Err(err) => FileOutcome::Failed {
            stage: err.stage,
            claimed: true,
            error: err.message,
        },
    }
}

/// Steps 4–11, running under an active claim. Any error here makes the
/// orchestrator revert the record to "never seen".
async fn run_claimed(
    ctx: &PipelineContext,
    audio_path: &Path,
    name: &str,
) -> Result<(bool, bool), StageError> {
    // 4. Timestamp extraction, falling back to the current wall clock
    let timestamp = match ctx.adapters.metadata.creation_time(audio_path).await {
        Ok(Some(t)) => t,
        Ok(None) => {
            debug!("no creation time in metadata, using current time");
            Local::now()
        }
        Err(e) => {
            warn!(error = %format!("{:#}", e), "metadata probe failed, using current time");
            Local::now()
        }
    };

    // 5. Normalize when the source format requires conversion
    let (transcribe_path, converted) = if ctx.adapters.normalizer.needs_normalization(audio_path) {
        let canonical = ctx
            .adapters
            .normalizer
            .normalize(audio_path)
            .await
            .map_err(|e| stage_err(Stage::Normalize, e))?;
        (canonical.clone(), Some(canonical))
    } else {
        (audio_path.to_path_buf(), None)
    };

    // 6. Transcribe; empty output is a failure, not an empty entry
    let transcript = ctx
        .adapters
        .transcriber
        .transcribe(&transcribe_path, &ctx.language)
        .await
        .map_err(|e| stage_err(Stage::Transcribe, e))?;
    if transcript.trim().is_empty() {
        return Err(stage_err(
            Stage::Transcribe,
            anyhow::anyhow!("transcriber returned empty text"),
        ));
    }

    // 7. Refine (optional): the refined text replaces the raw transcript
    // under the same timestamp header
    let header = timestamp.format(ENTRY_HEADER_FORMAT).to_string();
    let mut entry = format!("{}\n\n{}", header, transcript.trim());
    if let Some(refiner) = &ctx.adapters.refiner {
        let refined = refiner
            .refine(&entry)
            .await
            .map_err(|e| stage_err(Stage::Refine, e))?;
        entry = format!("{}\n\n{}", header, refined);
    }

    // 8. Materialize the intermediate text artifact
    let artifact_name = format!(
        "{}_{}.txt",
        timestamp.format(ARTIFACT_TS_FORMAT),
        sanitize_file_name(name)
    );
    let artifact_path = ctx.output_dir.join(&artifact_name);
    tokio::fs::write(&artifact_path, &entry)
        .await
        .map_err(|e| stage_err(Stage::Materialize, e))?;

    // 9. Import, at most once per content fingerprint. The check → import →
    // record sequence runs under the store's import lock so concurrent
    // workers cannot both import identical content.
    let entry_fingerprint = fingerprint(&entry);
    let mut imported = false;
    let mut import_failed = false;
    {
        let _imports = ctx.store.lock_imports().await;
        if ctx.store.is_imported(&entry_fingerprint).await {
            info!(
                fingerprint = %&entry_fingerprint[..12],
                "content already imported, skipping journal import"
            );
        } else {
            match ctx.adapters.importer.import(&entry, timestamp).await {
                Ok(()) => {
                    ctx.store
                        .record_import(&entry_fingerprint)
                        .await
                        .map_err(|e| stage_err(Stage::Import, e))?;
                    imported = true;
                }
                Err(e) => {
                    // Soft failure: the artifact was produced, so the file
                    // still finalizes. The fingerprint stays unrecorded, so
                    // the same content can import on a later occurrence.
                    warn!(error = %format!("{:#}", e), "journal import failed, continuing");
                    import_failed = true;
                }
            }
        }
    }

    // 10. Cleanup: drop artifacts, move the original out of the input
    // directory (rename, not copy, so a crash cannot duplicate it)
    tokio::fs::remove_file(&artifact_path)
        .await
        .map_err(|e| stage_err(Stage::Cleanup, e))?;
    if let Some(converted_path) = converted {
        tokio::fs::remove_file(&converted_path)
            .await
            .map_err(|e| stage_err(Stage::Cleanup, e))?;
        debug!(path = %converted_path.display(), "removed temporary converted audio");
    }
    let dest = ctx.output_dir.join(name);
    tokio::fs::rename(audio_path, &dest)
        .await
        .map_err(|e| stage_err(Stage::Cleanup, e))?;
    info!(dest = %dest.display(), "moved original to output directory");

    // 11. Finalize
    ctx.store
        .finalize(name)
        .await
        .map_err(|e| stage_err(Stage::Finalize, e))?;

    Ok((imported, import_failed))
}

/// Keep only alphanumerics, spaces, `-`, `_`, `.`; trailing whitespace
/// trimmed.
pub fn sanitize_file_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    kept.trim_end().to_string()
}

/// Stable content fingerprint: SHA-256 of the final entry text, hex-encoded.
/// Stable across process restarts, so at-most-once import holds across runs.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
