//! Fine-tuning: create, upload, verify, train, archive, generate, delete

use crate::helpers::*;
use leap_pipeline::api::wire::{ImageJobRequest, ModelCreateRequest, TrainingRequest};
use leap_pipeline::api::{ApiError, Method, RequestBody, SampleSource};
use leap_pipeline::core::{ExecutionStatus, RetryPolicy, Stage};
use leap_pipeline::execution::{FailureKind, FineTuneSpec, NoMoreSamples, QueuedSamples};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const VERSION_ID: &str = "version-1";
const SAMPLE_IDS: [&str; 3] = ["s1", "s2", "s3"];

fn url_samples(n: usize) -> Vec<SampleSource> {
    (0..n)
        .map(|i| SampleSource::Url(format!("https://cdn.example.com/me/{}.jpg", i)))
        .collect()
}

fn spec() -> FineTuneSpec {
    FineTuneSpec {
        model: ModelCreateRequest::new("Me", "@me"),
        samples: url_samples(3),
        training: TrainingRequest::new("base-weights"),
        generate: None,
        delete_after: false,
    }
}

/// Script every call of a successful run up to archiving
fn script_service(transport: &MockTransport) {
    let e = endpoints();
    transport.on(Method::Post, e.models(), vec![ok(json!({ "id": MODEL_ID, "title": "Me" }))]);
    transport.on(Method::Get, e.models(), vec![ok(json!([{ "id": "other" }, { "id": MODEL_ID }]))]);
    transport.on(Method::Get, e.model(MODEL_ID), vec![ok(json!({ "id": MODEL_ID }))]);
    transport.on(
        Method::Post,
        e.samples_from_url(MODEL_ID),
        vec![ok(json!([{ "id": "uploaded" }]))],
    );
    let listed: Vec<_> = SAMPLE_IDS.iter().map(|id| json!({ "id": id })).collect();
    transport.on(Method::Get, e.samples(MODEL_ID), vec![ok(json!(listed))]);
    transport.on(Method::Get, e.sample(MODEL_ID, "s1"), vec![ok(json!({ "id": "s1" }))]);
    transport.on(
        Method::Post,
        e.training_queue(MODEL_ID),
        vec![ok(json!({ "id": VERSION_ID, "status": "queued" }))],
    );
    transport.on(
        Method::Get,
        e.version(MODEL_ID, VERSION_ID),
        vec![
            ok(json!({ "id": VERSION_ID, "status": "queued" })),
            ok(json!({ "id": VERSION_ID, "status": "training" })),
            ok(json!({
                "id": VERSION_ID,
                "status": "finished",
                "weights": { "id": "w1", "uri": "https://cdn.example.com/w1.ckpt" }
            })),
        ],
    );
    for id in SAMPLE_IDS {
        transport.on(Method::Post, e.sample_archive(MODEL_ID, id), vec![status_only(200)]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_run_archives_every_sample() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);

    let report = engine(&transport, dir.path())
        .run_fine_tune(&spec(), &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap();

    let ctx = &report.context;
    assert_eq!(ctx.status, ExecutionStatus::Completed);
    assert_eq!(ctx.resource(), MODEL_ID);
    assert_eq!((ctx.uploaded, ctx.verified, ctx.archived), (3, 3, 3));
    let stages: Vec<Stage> = ctx.stages.iter().map(|r| r.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Created,
            Stage::SamplesUploading,
            Stage::SamplesVerified,
            Stage::TrainingQueued,
            Stage::TrainingPolling,
            Stage::TrainingFinished,
            Stage::SamplesArchived,
        ]
    );

    let e = endpoints();
    assert_eq!(transport.count(Method::Get, &e.version(MODEL_ID, VERSION_ID)), 3);
    for id in SAMPLE_IDS {
        assert_eq!(transport.count(Method::Post, &e.sample_archive(MODEL_ID, id)), 1);
    }
    assert!(report.files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_archive_failure_is_retried_for_that_sample_only() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    let e = endpoints();
    transport.on(
        Method::Post,
        e.sample_archive(MODEL_ID, "s2"),
        vec![status_only(503), status_only(200)],
    );

    let report = engine(&transport, dir.path())
        .run_fine_tune(&spec(), &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.context.archived, 3);
    let archive_calls: Vec<String> = transport
        .calls()
        .into_iter()
        .filter(|(m, p)| *m == Method::Post && p.ends_with("/archive"))
        .map(|(_, p)| p)
        .collect();
    assert_eq!(archive_calls.len(), 4);
    let mut distinct = archive_calls.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 3);
    assert_eq!(transport.count(Method::Post, &e.sample_archive(MODEL_ID, "s2")), 2);
}

#[tokio::test]
async fn test_empty_title_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let mut spec = spec();
    spec.model.title = "  ".to_string();

    let err = engine(&transport, dir.path())
        .run_fine_tune(&spec, &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Created);
    assert!(matches!(err.api_error(), Some(ApiError::Validation { field: "title", .. })));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_unlisted_model_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    transport.on(Method::Get, endpoints().models(), vec![ok(json!([{ "id": "other" }]))]);

    let err = engine(&transport, dir.path())
        .run_fine_tune(&spec(), &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Created);
    assert_eq!(err.resource_id, MODEL_ID);
    assert!(matches!(err.kind, FailureKind::Verification(_)));
    assert_eq!(transport.count(Method::Post, &endpoints().samples_from_url(MODEL_ID)), 0);
}

#[tokio::test]
async fn test_provider_supplies_samples_after_failed_batch() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    let e = endpoints();
    transport.on(
        Method::Post,
        e.samples_from_url(MODEL_ID),
        vec![status_only(400), ok(json!([{ "id": "s1" }]))],
    );
    transport.on(Method::Get, e.samples(MODEL_ID), vec![ok(json!([{ "id": "s1" }]))]);
    transport.on(
        Method::Get,
        e.version(MODEL_ID, VERSION_ID),
        vec![ok(json!({ "status": "failed" }))],
    );

    let mut spec = spec();
    spec.samples = url_samples(1);
    let mut provider = QueuedSamples::new(vec![url_samples(1)]);

    let err = engine(&transport, dir.path())
        .run_fine_tune(&spec, &mut provider, &CancellationToken::new())
        .await
        .unwrap_err();

    // the second batch uploaded, so the run got as far as training
    assert_eq!(err.stage, Stage::TrainingPolling);
    assert!(matches!(err.kind, FailureKind::JobFailed { .. }));
    assert_eq!(transport.count(Method::Post, &e.samples_from_url(MODEL_ID)), 2);
    assert!(transport.calls().iter().all(|(_, p)| !p.ends_with("/archive")));
}

#[tokio::test]
async fn test_no_samples_halts_upload() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);

    let mut spec = spec();
    spec.samples.clear();

    let err = engine(&transport, dir.path())
        .run_fine_tune(&spec, &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::SamplesUploading);
    assert!(matches!(err.kind, FailureKind::NoSamples));
}

#[tokio::test(start_paused = true)]
async fn test_generate_and_delete_after_training() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    let e = endpoints();
    let uri = "https://cdn.example.com/gen/0.png";
    transport.on(Method::Post, e.image_jobs(MODEL_ID), vec![ok(json!({ "id": "gen-1" }))]);
    transport.on(
        Method::Get,
        e.image_job(MODEL_ID, "gen-1"),
        vec![ok(image_job("gen-1", "finished", &[uri]))],
    );
    transport.serve(uri, Some(b"knight"));
    transport.on(Method::Delete, e.model(MODEL_ID), vec![status_only(204)]);

    let mut spec = spec();
    spec.generate = Some(ImageJobRequest::new("@me as a knight"));
    spec.delete_after = true;

    let report = engine(&transport, dir.path())
        .run_fine_tune(&spec, &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.files().len(), 1);
    assert!(report.context.has_reached(Stage::ImageGenerated));
    assert_eq!(report.context.current_stage(), Some(Stage::Deleted));
    assert_eq!(transport.count(Method::Delete, &e.model(MODEL_ID)), 1);

    let create = transport
        .requests()
        .into_iter()
        .find(|r| r.method == Method::Post && r.path == e.image_jobs(MODEL_ID))
        .unwrap();
    let RequestBody::Json(body) = create.body else {
        panic!("expected a JSON body");
    };
    assert_eq!(body["prompt"], "@me as a knight");
    assert!(body.get("seed").is_none());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine(&transport, dir.path())
        .run_fine_tune(&spec(), &mut NoMoreSamples, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_fewer_listed_samples_than_uploaded_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    let e = endpoints();
    transport.on(Method::Get, e.samples(MODEL_ID), vec![ok(json!([{ "id": "s1" }]))]);

    let err = engine(&transport, dir.path())
        .run_fine_tune(&spec(), &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::SamplesVerified);
    match &err.kind {
        FailureKind::Verification(message) => assert!(message.contains("1 samples but 3")),
        other => panic!("unexpected failure: {:?}", other),
    }
    assert_eq!(transport.count(Method::Post, &e.training_queue(MODEL_ID)), 0);
}

#[tokio::test]
async fn test_listed_samples_without_ids_fail_verification() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    let e = endpoints();
    transport.on(
        Method::Get,
        e.samples(MODEL_ID),
        vec![ok(json!([{ "uri": "a.png" }, { "uri": "b.png" }, { "uri": "c.png" }]))],
    );

    let err = engine(&transport, dir.path())
        .run_fine_tune(&spec(), &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::SamplesVerified);
    assert!(matches!(&err.kind, FailureKind::Verification(m) if m.contains("no ids")));
    assert_eq!(transport.count(Method::Post, &e.training_queue(MODEL_ID)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sample_fetch_falls_through_to_next_id() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    let e = endpoints();
    transport.on(Method::Get, e.sample(MODEL_ID, "s1"), vec![status_only(404)]);
    transport.on(Method::Get, e.sample(MODEL_ID, "s2"), vec![ok(json!({ "id": "s2" }))]);

    let report = engine(&transport, dir.path())
        .run_fine_tune(&spec(), &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.context.verified, 3);
    assert_eq!(transport.count(Method::Get, &e.sample(MODEL_ID, "s1")), 1);
    assert_eq!(transport.count(Method::Get, &e.sample(MODEL_ID, "s2")), 1);
    assert_eq!(transport.count(Method::Get, &e.sample(MODEL_ID, "s3")), 0);
}

#[tokio::test]
async fn test_no_fetchable_sample_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    let e = endpoints();
    transport.on(Method::Get, e.sample(MODEL_ID, "s1"), vec![status_only(404)]);

    let err = engine(&transport, dir.path())
        .run_fine_tune(&spec(), &mut NoMoreSamples, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::SamplesVerified);
    assert!(matches!(err.kind, FailureKind::Verification(_)));
    for id in SAMPLE_IDS {
        assert_eq!(transport.count(Method::Get, &e.sample(MODEL_ID, id)), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_archive_retry_wait() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    script_service(&transport);
    let e = endpoints();
    transport.on(Method::Post, e.sample_archive(MODEL_ID, "s2"), vec![status_only(503)]);

    let mut polling = fast_polling();
    polling.archive = RetryPolicy::new(Duration::from_secs(3600), 3);
    let engine = engine(&transport, dir.path()).with_polling(polling);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = engine
        .run_fine_tune(&spec(), &mut NoMoreSamples, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.stage, Stage::SamplesArchived);
    assert!(started.elapsed() < Duration::from_secs(3600));
    assert_eq!(transport.count(Method::Post, &e.sample_archive(MODEL_ID, "s2")), 1);
}
