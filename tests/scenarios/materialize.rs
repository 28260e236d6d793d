//! Writing artifacts next to files from earlier runs

use crate::helpers::*;
use leap_pipeline::core::Artifact;
use leap_pipeline::execution::{Materializer, NamingScheme};
use std::sync::Arc;

#[tokio::test]
async fn test_failed_download_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("job-1_1.png");
    std::fs::write(&existing, b"earlier run").unwrap();

    let transport = MockTransport::new();
    let materializer = Materializer::new(Arc::new(client(&transport)));
    let artifacts = vec![Artifact::new("https://cdn.example.com/unserved.png")];

    let report = materializer
        .materialize(&artifacts, dir.path(), &NamingScheme::for_job("job-1"))
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(report.written.is_empty());
    assert_eq!(std::fs::read(&existing).unwrap(), b"earlier run");
    assert!(!dir.path().join("job-1_1.png.part").exists());
}

#[tokio::test]
async fn test_successful_download_replaces_file_and_leaves_no_partial() {
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("job-1_1.png");
    std::fs::write(&existing, b"earlier run").unwrap();

    let transport = MockTransport::new();
    transport.serve("https://cdn.example.com/0.png", Some(b"fresh bytes"));
    transport.serve("https://cdn.example.com/1.png", None);
    let materializer = Materializer::new(Arc::new(client(&transport)));
    let artifacts = vec![
        Artifact::new("https://cdn.example.com/0.png"),
        Artifact::new("https://cdn.example.com/1.png"),
    ];

    let report = materializer
        .materialize(&artifacts, dir.path(), &NamingScheme::for_job("job-1"))
        .await
        .unwrap();

    assert_eq!(report.written, vec![existing.clone()]);
    assert_eq!(report.failures[0].uri, "https://cdn.example.com/1.png");
    assert_eq!(std::fs::read(&existing).unwrap(), b"fresh bytes");

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["job-1_1.png"]);
}
