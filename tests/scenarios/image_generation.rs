//! Image generation: submit, poll, write files

use crate::helpers::*;
use leap_pipeline::api::wire::ImageJobRequest;
use leap_pipeline::api::{ApiError, Method};
use leap_pipeline::core::{ExecutionStatus, RetryPolicy, Stage};
use leap_pipeline::execution::{FailureKind, PipelineEvent};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const JOB_ID: &str = "job-1";
const IMAGE_URI: &str = "https://cdn.example.com/job-1/0.png";

fn script_job(transport: &MockTransport, states: &[&str]) {
    let e = endpoints();
    transport.on(
        Method::Post,
        e.image_jobs(MODEL_ID),
        vec![ok(json!({ "id": JOB_ID, "state": "queued" }))],
    );
    let polls = states
        .iter()
        .map(|state| {
            let uris: &[&str] = if *state == "finished" { &[IMAGE_URI] } else { &[] };
            ok(image_job(JOB_ID, state, uris))
        })
        .collect();
    transport.on(Method::Get, e.image_job(MODEL_ID, JOB_ID), polls);
}

#[tokio::test(start_paused = true)]
async fn test_queued_then_finished_writes_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_job(&transport, &["queued", "finished"]);
    transport.serve(IMAGE_URI, Some(b"png-bytes"));

    let (engine, events) = record_events(engine(&transport, dir.path()));
    let report = engine
        .run_image_generation(None, &ImageJobRequest::new("a lighthouse"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.files().len(), 1);
    assert_eq!(std::fs::read(&report.files()[0]).unwrap(), b"png-bytes");
    assert_eq!(report.context.status, ExecutionStatus::Completed);
    assert_eq!(report.context.resource(), MODEL_ID);
    let stages: Vec<Stage> = report.context.stages.iter().map(|r| r.stage).collect();
    assert_eq!(stages, vec![Stage::Submitted, Stage::Polling, Stage::Completed]);

    assert_eq!(transport.count(Method::Get, &endpoints().image_job(MODEL_ID, JOB_ID)), 2);

    let events = events.lock().unwrap();
    assert!(matches!(events.first(), Some(PipelineEvent::PipelineStarted { .. })));
    assert!(matches!(events.last(), Some(PipelineEvent::PipelineCompleted { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::ArtifactWritten { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_always_running_times_out_after_max_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_job(&transport, &["running"]);

    let mut polling = fast_polling();
    polling.image = RetryPolicy::new(Duration::from_secs(5), 3);
    let engine = engine(&transport, dir.path()).with_polling(polling);

    let err = engine
        .run_image_generation(None, &ImageJobRequest::new("a lighthouse"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_timed_out());
    assert_eq!(err.stage, Stage::Polling);
    assert!(matches!(err.kind, FailureKind::TimedOut { attempts: 3, .. }));
    assert_eq!(transport.count(Method::Get, &endpoints().image_job(MODEL_ID, JOB_ID)), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_halts_without_files() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_job(&transport, &["queued", "failed"]);

    let err = engine(&transport, dir.path())
        .run_image_generation(None, &ImageJobRequest::new("a lighthouse"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.kind, FailureKind::JobFailed { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_out_of_bounds_requests_make_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let engine = engine(&transport, dir.path());
    let cancel = CancellationToken::new();

    let too_many = ImageJobRequest::new("a fox").with_images(5);
    let err = engine.run_image_generation(None, &too_many, &cancel).await.unwrap_err();
    assert!(matches!(
        err.api_error(),
        Some(ApiError::Validation { field: "numberOfImages", .. })
    ));

    let too_long = ImageJobRequest::new("a fox").with_steps(101);
    let err = engine.run_image_generation(None, &too_long, &cancel).await.unwrap_err();
    assert!(matches!(err.api_error(), Some(ApiError::Validation { field: "steps", .. })));

    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_partial_download_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let e = endpoints();
    let good = "https://cdn.example.com/job-1/0.png";
    let bad = "https://cdn.example.com/job-1/1.png";
    transport.on(Method::Post, e.image_jobs(MODEL_ID), vec![ok(json!({ "id": JOB_ID }))]);
    transport.on(
        Method::Get,
        e.image_job(MODEL_ID, JOB_ID),
        vec![ok(image_job(JOB_ID, "finished", &[good, bad]))],
    );
    transport.serve(good, Some(b"first"));
    transport.serve(bad, None);

    let report = engine(&transport, dir.path())
        .run_image_generation(None, &ImageJobRequest::new("two").with_images(2), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.files().len(), 1);
    assert_eq!(report.materialized.failures.len(), 1);
    assert_eq!(report.materialized.failures[0].uri, bad);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_polling() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_job(&transport, &["running"]);

    let mut polling = fast_polling();
    polling.image = RetryPolicy::new(Duration::from_secs(5), 100);
    let engine = engine(&transport, dir.path()).with_polling(polling);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        trigger.cancel();
    });

    let err = engine
        .run_image_generation(None, &ImageJobRequest::new("a lighthouse"), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.stage, Stage::Polling);
    assert_eq!(transport.count(Method::Get, &endpoints().image_job(MODEL_ID, JOB_ID)), 2);
}

#[tokio::test]
async fn test_no_target_and_no_default_fails_before_submitting() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let client = leap_pipeline::LeapClient::with_transport(
        transport.clone(),
        leap_pipeline::ClientConfig::new("test-key"),
    );
    let engine = leap_pipeline::PipelineEngine::new(client).with_output_dir(dir.path());

    let err = engine
        .run_image_generation(None, &ImageJobRequest::new("a fox"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.api_error(), Some(ApiError::Validation { field: "modelId", .. })));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_zero_attempt_policy_fails_before_submitting() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_job(&transport, &["finished"]);

    let mut polling = fast_polling();
    polling.image = RetryPolicy::new(Duration::from_millis(1), 0);
    let engine = engine(&transport, dir.path()).with_polling(polling);

    let err = engine
        .run_image_generation(None, &ImageJobRequest::new("a lighthouse"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Submitted);
    match &err.kind {
        FailureKind::InvalidPolicy(message) => assert!(message.contains("polling.image")),
        other => panic!("unexpected failure: {:?}", other),
    }
    assert!(transport.calls().is_empty());
}
