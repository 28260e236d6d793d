//! Deleting image jobs and projects

use crate::helpers::*;
use leap_pipeline::api::{ApiError, Method};
use leap_pipeline::core::PreTrainedModel;
use serde_json::json;

#[tokio::test]
async fn test_delete_image_jobs_counts_per_model() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let e = endpoints();
    let disney = PreTrainedModel::ModernDisney.id();
    transport.on(
        Method::Get,
        e.image_jobs(disney),
        vec![ok(json!([{ "id": "j1" }, { "id": "j2" }, { "state": "finished" }]))],
    );
    transport.on(Method::Delete, e.image_job(disney, "j1"), vec![status_only(204)]);
    transport.on(Method::Delete, e.image_job(disney, "j2"), vec![status_only(200)]);
    transport.on(Method::Get, e.image_jobs(MODEL_ID), vec![ok(json!([]))]);

    let deleted = engine(&transport, dir.path())
        .delete_image_jobs(&["ModernDisney".to_string(), MODEL_ID.to_string()])
        .await
        .unwrap();

    assert_eq!(deleted, vec![(disney.to_string(), 2), (MODEL_ID.to_string(), 0)]);
    assert_eq!(transport.count(Method::Delete, &e.image_job(disney, "j1")), 1);
}

#[tokio::test]
async fn test_failed_delete_surfaces_status() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let e = endpoints();
    transport.on(Method::Get, e.image_jobs(MODEL_ID), vec![ok(json!([{ "id": "j1" }]))]);
    transport.on(Method::Delete, e.image_job(MODEL_ID, "j1"), vec![status_only(403)]);

    let err = engine(&transport, dir.path())
        .delete_image_jobs(&[MODEL_ID.to_string()])
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_delete_project() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::new();
    let e = endpoints();
    transport.on(Method::Delete, e.project("p-1"), vec![status_only(204)]);
    let engine = engine(&transport, dir.path());

    engine.delete_project("p-1").await.unwrap();
    assert!(matches!(
        engine.delete_project(" ").await,
        Err(ApiError::Validation { field: "projectId", .. })
    ));
    assert!(matches!(
        engine.delete_project("p-2").await,
        Err(ApiError::Transport { status: 404, .. })
    ));
    assert_eq!(transport.calls().len(), 2);
}
