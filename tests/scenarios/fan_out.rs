//! One image pipeline per model

use crate::helpers::*;
use leap_pipeline::api::wire::ImageJobRequest;
use leap_pipeline::api::Method;
use leap_pipeline::core::PreTrainedModel;
use leap_pipeline::execution::{FailureKind, SchedulingStrategy};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn script_model(transport: &MockTransport, model_id: &str, final_state: &str) {
    let e = endpoints();
    let job_id = format!("job-{}", &model_id[..8]);
    let uri = format!("https://cdn.example.com/{}.png", job_id);
    transport.on(Method::Post, e.image_jobs(model_id), vec![ok(json!({ "id": job_id }))]);
    let uris: Vec<&str> = if final_state == "finished" { vec![uri.as_str()] } else { vec![] };
    transport.on(
        Method::Get,
        e.image_job(model_id, &job_id),
        vec![ok(image_job(&job_id, "queued", &[])), ok(image_job(&job_id, final_state, &uris))],
    );
    transport.serve(uri.as_str(), Some(b"img"));
}

async fn run(strategy: SchedulingStrategy) {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let models = [
        PreTrainedModel::OpenJourney4,
        PreTrainedModel::ModernDisney,
        PreTrainedModel::FutureDiffusion,
    ];
    script_model(&transport, models[0].id(), "finished");
    script_model(&transport, models[1].id(), "failed");
    script_model(&transport, models[2].id(), "finished");

    let names: Vec<String> = models.iter().map(|m| m.name().to_string()).collect();
    let results = engine(&transport, dir.path())
        .generate_across_models(&ImageJobRequest::new("a castle"), &names, strategy, &CancellationToken::new())
        .await;

    assert_eq!(results.len(), 3);
    let order: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(order, vec!["OpenJourney4", "ModernDisney", "FutureDiffusion"]);

    let first = results[0].1.as_ref().unwrap();
    assert!(first.files()[0].ends_with("OpenJourney4_1.png"));
    assert_eq!(first.context.resource(), models[0].id());

    let second = results[1].1.as_ref().unwrap_err();
    assert!(matches!(second.kind, FailureKind::JobFailed { .. }));
    assert_eq!(second.resource_id, models[1].id());

    assert!(results[2].1.as_ref().unwrap().files()[0].ends_with("FutureDiffusion_1.png"));

    // every run has its own context
    let first_run = results[0].1.as_ref().unwrap().context.run_id;
    let third_run = results[2].1.as_ref().unwrap().context.run_id;
    assert_ne!(first_run, third_run);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_fan_out_reports_each_model() {
    run(SchedulingStrategy::Sequential).await;
}

#[tokio::test(start_paused = true)]
async fn test_parallel_fan_out_keeps_model_order() {
    run(SchedulingStrategy::Parallel).await;
}

#[tokio::test(start_paused = true)]
async fn test_limited_fan_out() {
    run(SchedulingStrategy::LimitedParallel(2)).await;
}
