//! Job service integration tests
//!
//! Runs whole jobs against a temporary store with a fake ffmpeg and checks
//! upload, purge and the notifications each job publishes.

mod common;

use std::time::Duration;

use common::{audio_request, fake_ffmpeg, Faults, TestHarness, SUCCEEDING_FFMPEG};
use eb_core::{EncodeData, EncodeState, Error};
use eb_server::job::run_job;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn successful_job_uploads_output_and_publishes_one_done() {
    let bin = tempfile::tempdir().unwrap();
    let Some(ffmpeg) = fake_ffmpeg(bin.path(), SUCCEEDING_FFMPEG) else {
        return;
    };
    let harness = TestHarness::new(Some(ffmpeg));
    harness.put_asset("a.mp3", b"speech");
    harness.put_asset("b.mp3", b"more speech");

    let outcome = run_job(
        &harness.ctx,
        audio_request("job-1", &["a.mp3", "b.mp3"]),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.job_id, "job-1");
    assert_eq!(outcome.output, "job-1.mp4");
    assert!(outcome.warnings.is_empty());
    assert!(harness.has_asset("job-1.mp4"));
    // Sources stay unless the request asks for a purge.
    assert!(harness.has_asset("a.mp3"));
    assert_eq!(harness.leftover_workspaces(), 0);

    let states = harness.notifier.states();
    assert!(states.contains(&EncodeState::InProgress));
    assert_eq!(states.last(), Some(&EncodeState::Done));
    assert_eq!(harness.notifier.terminal().len(), 1);
}

#[tokio::test]
async fn purge_removes_every_source_asset() {
    let bin = tempfile::tempdir().unwrap();
    let Some(ffmpeg) = fake_ffmpeg(bin.path(), SUCCEEDING_FFMPEG) else {
        return;
    };
    let harness = TestHarness::new(Some(ffmpeg));
    harness.put_asset("a.mp3", b"speech");
    harness.put_asset("bed.mp3", b"music");

    let mut request = audio_request("job-2", &["a.mp3"]);
    request.side_audio_key = Some("bed.mp3".into());
    request.options.delete_assets_from_obj_store = true;

    let outcome = run_job(&harness.ctx, request, CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.warnings.is_empty());
    assert!(!harness.has_asset("a.mp3"));
    assert!(!harness.has_asset("bed.mp3"));
    assert!(harness.has_asset("job-2.mp4"));
}

#[tokio::test]
async fn failed_purge_is_a_warning_not_a_failure() {
    let bin = tempfile::tempdir().unwrap();
    let Some(ffmpeg) = fake_ffmpeg(bin.path(), SUCCEEDING_FFMPEG) else {
        return;
    };
    let harness = TestHarness::with_faults(
        Some(ffmpeg),
        Faults {
            delete: true,
            ..Default::default()
        },
    );
    harness.put_asset("a.mp3", b"speech");

    let mut request = audio_request("job-3", &["a.mp3"]);
    request.options.delete_assets_from_obj_store = true;

    let outcome = run_job(&harness.ctx, request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("a.mp3"), "{:?}", outcome.warnings);
    assert!(harness.has_asset("a.mp3"));
    assert_eq!(harness.notifier.states().last(), Some(&EncodeState::Done));
}

#[tokio::test]
async fn upload_failure_publishes_one_error() {
    let bin = tempfile::tempdir().unwrap();
    let Some(ffmpeg) = fake_ffmpeg(bin.path(), SUCCEEDING_FFMPEG) else {
        return;
    };
    let harness = TestHarness::with_faults(
        Some(ffmpeg),
        Faults {
            put: true,
            ..Default::default()
        },
    );
    harness.put_asset("a.mp3", b"speech");

    let err = run_job(
        &harness.ctx,
        audio_request("job-4", &["a.mp3"]),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Storage { .. }), "{err:?}");
    let terminal = harness.notifier.terminal();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].state, EncodeState::Error);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn missing_encoder_fails_the_job() {
    let harness = TestHarness::new(None);

    let err = run_job(
        &harness.ctx,
        audio_request("job-5", &["absent.mp3"]),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    // ffmpeg is looked up before anything is downloaded.
    assert!(matches!(err, Error::Tool { .. }), "{err:?}");
    assert_eq!(harness.notifier.terminal().len(), 1);
}

#[tokio::test]
async fn download_failure_names_the_key() {
    let bin = tempfile::tempdir().unwrap();
    let Some(ffmpeg) = fake_ffmpeg(bin.path(), SUCCEEDING_FFMPEG) else {
        return;
    };
    let harness = TestHarness::new(Some(ffmpeg));
    harness.put_asset("a.mp3", b"speech");

    let err = run_job(
        &harness.ctx,
        audio_request("job-6", &["a.mp3", "absent.mp3"]),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match &err {
        Error::Download { key, .. } => assert_eq!(key, "absent.mp3"),
        other => panic!("unexpected error: {other:?}"),
    }
    match harness.notifier.terminal().as_slice() {
        [event] => match &event.data {
            Some(EncodeData::Error { message }) => assert!(message.contains("absent.mp3")),
            other => panic!("unexpected payload: {other:?}"),
        },
        other => panic!("expected one terminal event, got {other:?}"),
    }
    assert!(!harness.has_asset("job-6.mp4"));
}

#[tokio::test]
async fn invalid_request_publishes_error() {
    let harness = TestHarness::new(None);

    let err = run_job(
        &harness.ctx,
        audio_request("job-7", &[]),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(harness.notifier.states(), vec![EncodeState::Error]);
}

#[tokio::test]
async fn cancellation_stops_the_encoder() {
    let bin = tempfile::tempdir().unwrap();
    let Some(ffmpeg) = fake_ffmpeg(bin.path(), "echo started >&2\nsleep 30") else {
        return;
    };
    let harness = TestHarness::new(Some(ffmpeg));
    harness.put_asset("a.mp3", b"speech");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        run_job(&harness.ctx, audio_request("job-8", &["a.mp3"]), cancel),
    )
    .await
    .expect("job did not stop after cancellation");

    assert!(matches!(result, Err(Error::Cancelled)), "{result:?}");
    match harness.notifier.terminal().as_slice() {
        [event] => match &event.data {
            Some(EncodeData::Error { message }) => assert_eq!(message, "Cancelled"),
            other => panic!("unexpected payload: {other:?}"),
        },
        other => panic!("expected one terminal event, got {other:?}"),
    }
    assert_eq!(harness.leftover_workspaces(), 0);
}
