//! Orchestrator-level scenarios: worker pool bounds, failure isolation,
//! claim reversion, crash recovery, and the terminal sweep.

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::*;
use tempfile::TempDir;
use voxlog::core::{Orchestrator, RunOptions, StateStore};
use voxlog::domain::FileStatus;

struct Fixture {
    _temp: TempDir,
    input: PathBuf,
    output: PathBuf,
}

async fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    tokio::fs::create_dir_all(&input).await.unwrap();
    Fixture {
        _temp: temp,
        input,
        output,
    }
}

fn options(fx: &Fixture, workers: usize, purge_failed: bool) -> RunOptions {
    RunOptions {
        input_dir: fx.input.clone(),
        output_dir: fx.output.clone(),
        language: "en".to_string(),
        workers,
        purge_failed,
    }
}

async fn status_of(output: &Path, name: &str) -> Option<FileStatus> {
    let store = StateStore::open(&StateStore::default_path(output))
        .await
        .unwrap();
    store.status_of(name).await
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let fx = fixture().await;
    write_small_audio(&fx.input.join("a.m4a")).await;
    tokio::fs::write(fx.input.join("b.wav"), vec![0u8; 5 * 1024 * 1024])
        .await
        .unwrap();

    let transcriber = MockTranscriber::returning("hello world");
    let importer = MockImporter::accepting();
    let orchestrator = Orchestrator::new(
        options(&fx, 4, false),
        adapter_set(transcriber.clone(), importer.clone()),
    );

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.transcribed, 1);
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.failed, 0);

    // a.m4a discarded, b.wav archived
    assert!(!fx.input.join("a.m4a").exists());
    assert!(!fx.input.join("b.wav").exists());
    assert!(fx.output.join("b.wav").exists());

    assert_eq!(status_of(&fx.output, "a.m4a").await, Some(FileStatus::Deleted));
    assert_eq!(
        status_of(&fx.output, "b.wav").await,
        Some(FileStatus::Transcribed)
    );

    // One import, carrying the transcript and the derived timestamp
    assert_eq!(importer.call_count(), 1);
    let entries = importer.entries.lock().await;
    assert!(entries[0].0.contains("hello world"));
    assert!(entries[0].0.contains("2024-03-01 10:00:00"));
}

#[tokio::test]
async fn test_pool_processes_all_files_within_bound() {
    let fx = fixture().await;
    for i in 0..8 {
        write_large_audio(&fx.input.join(format!("memo{}.wav", i))).await;
    }

    let transcriber = MockTranscriber::slow("words", Duration::from_millis(100));
    let importer = MockImporter::accepting();
    let orchestrator = Orchestrator::new(
        options(&fx, 2, false),
        adapter_set(transcriber.clone(), importer),
    );

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.scanned, 8);
    assert_eq!(summary.transcribed, 8);
    assert_eq!(summary.failed, 0);
    assert_eq!(transcriber.call_count(), 8);

    // Never more than `workers` transcriptions in flight
    assert!(
        transcriber.peak_concurrency() <= 2,
        "peak concurrency was {}",
        transcriber.peak_concurrency()
    );

    for i in 0..8 {
        let name = format!("memo{}.wav", i);
        assert!(fx.output.join(&name).exists());
        assert_eq!(
            status_of(&fx.output, &name).await,
            Some(FileStatus::Transcribed)
        );
    }
}

#[tokio::test]
async fn test_failed_file_reverted_and_kept_for_retry() {
    let fx = fixture().await;
    let audio = fx.input.join("bad.wav");
    write_large_audio(&audio).await;

    let orchestrator = Orchestrator::new(
        options(&fx, 2, false),
        adapter_set(MockTranscriber::failing(), MockImporter::accepting()),
    );

    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].file, "bad.wav");
    assert_eq!(summary.failures[0].stage, "transcribe");

    // Record reverted to "never seen"; file left in place for retry
    assert_eq!(status_of(&fx.output, "bad.wav").await, None);
    assert!(audio.exists());

    // A later run with a working backend picks it up again
    let importer = MockImporter::accepting();
    let retry = Orchestrator::new(
        options(&fx, 2, false),
        adapter_set(MockTranscriber::returning("recovered"), importer.clone()),
    );
    let summary = retry.run().await.unwrap();

    assert_eq!(summary.transcribed, 1);
    assert_eq!(importer.call_count(), 1);
    assert_eq!(
        status_of(&fx.output, "bad.wav").await,
        Some(FileStatus::Transcribed)
    );
}

#[tokio::test]
async fn test_purge_failed_empties_the_input_directory() {
    let fx = fixture().await;
    let audio = fx.input.join("bad.wav");
    write_large_audio(&audio).await;

    let orchestrator = Orchestrator::new(
        options(&fx, 2, true),
        adapter_set(MockTranscriber::failing(), MockImporter::accepting()),
    );

    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.failed, 1);

    // Scratch directory ends empty even for the failed file; its record
    // is absent so it would be retried only if re-copied in
    assert!(!audio.exists());
    assert_eq!(status_of(&fx.output, "bad.wav").await, None);
}

#[tokio::test]
async fn test_one_failure_never_aborts_siblings() {
    let fx = fixture().await;
    write_large_audio(&fx.input.join("bad-memo.wav")).await;
    write_large_audio(&fx.input.join("good1.wav")).await;
    write_large_audio(&fx.input.join("good2.wav")).await;

    let transcriber = MockTranscriber::failing_for("bad-memo", "fine words");
    let importer = MockImporter::accepting();
    let orchestrator = Orchestrator::new(
        options(&fx, 3, false),
        adapter_set(transcriber, importer),
    );

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.transcribed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        status_of(&fx.output, "good1.wav").await,
        Some(FileStatus::Transcribed)
    );
    assert_eq!(
        status_of(&fx.output, "good2.wav").await,
        Some(FileStatus::Transcribed)
    );
    assert_eq!(status_of(&fx.output, "bad-memo.wav").await, None);
}

#[tokio::test]
async fn test_second_run_skips_and_sweeps_reappeared_files() {
    let fx = fixture().await;
    let audio = fx.input.join("b.wav");
    write_large_audio(&audio).await;

    let transcriber = MockTranscriber::returning("hello world");
    let importer = MockImporter::accepting();
    let orchestrator = Orchestrator::new(
        options(&fx, 2, false),
        adapter_set(transcriber.clone(), importer.clone()),
    );

    orchestrator.run().await.unwrap();
    assert_eq!(transcriber.call_count(), 1);

    // The ingestion step re-copies the same file; the rerun must not
    // touch any collaborator and must clear it out again
    write_large_audio(&audio).await;
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.transcribed, 0);
    assert_eq!(transcriber.call_count(), 1);
    assert_eq!(importer.call_count(), 1);
    assert!(!audio.exists());
}

#[tokio::test]
async fn test_interrupted_claim_recovered_on_next_run() {
    let fx = fixture().await;
    tokio::fs::create_dir_all(&fx.output).await.unwrap();

    // Simulate a crash mid-transcription: a claim persisted, process gone
    {
        let store = StateStore::open(&StateStore::default_path(&fx.output))
            .await
            .unwrap();
        store.claim("stuck.wav").await.unwrap();
    }
    write_large_audio(&fx.input.join("stuck.wav")).await;

    let importer = MockImporter::accepting();
    let orchestrator = Orchestrator::new(
        options(&fx, 2, false),
        adapter_set(MockTranscriber::returning("recovered words"), importer.clone()),
    );

    let summary = orchestrator.run().await.unwrap();

    // The stale claim was dropped and the file processed from scratch
    assert_eq!(summary.transcribed, 1);
    assert_eq!(importer.call_count(), 1);
    assert_eq!(
        status_of(&fx.output, "stuck.wav").await,
        Some(FileStatus::Transcribed)
    );
}

#[tokio::test]
async fn test_duplicate_content_across_concurrent_workers() {
    let fx = fixture().await;
    for i in 0..4 {
        write_large_audio(&fx.input.join(format!("copy{}.wav", i))).await;
    }

    // All four transcribe to identical text and race through the same
    // fingerprint check
    let transcriber = MockTranscriber::slow("identical entry", Duration::from_millis(20));
    let importer = MockImporter::accepting();
    let orchestrator = Orchestrator::new(
        options(&fx, 4, false),
        adapter_set(transcriber, importer.clone()),
    );

    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.transcribed, 4);
    assert_eq!(summary.imported, 1);
    assert_eq!(importer.call_count(), 1);
}
