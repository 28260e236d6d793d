//! Result materializer - streams artifacts to local files

use crate::api::{ApiError, ByteStream, LeapClient, Transport};
use crate::core::{Artifact, PreTrainedModel};
use futures::StreamExt;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub const IMAGE_EXTENSION: &str = "png";

/// Suffix of a file still being streamed
const PARTIAL_SUFFIX: &str = "part";

static LABEL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]+").expect("valid regex"));

/// Deterministic file names: `{label}_{index}.png`, index starting at 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
    label: String,
}

impl NamingScheme {
    /// Label with the catalog alias of `model_id`, or the job id when the
    /// model is not in the catalog
    pub fn for_model(model_id: &str, job_id: &str) -> Self {
        match PreTrainedModel::from_id(model_id) {
            Some(model) => Self::labelled(model.name()),
            None => Self::labelled(job_id),
        }
    }

    /// Label with the job id
    pub fn for_job(job_id: &str) -> Self {
        Self::labelled(job_id)
    }

    pub fn labelled(label: &str) -> Self {
        Self {
            label: sanitize(label),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn file_name(&self, index: usize) -> String {
        format!("{}_{}.{}", self.label, index, IMAGE_EXTENSION)
    }
}

fn sanitize(label: &str) -> String {
    let cleaned = LABEL_CHARS.replace_all(label.trim(), "_").into_owned();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "image".to_string()
    } else {
        cleaned
    }
}

/// An artifact that could not be written
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadFailure {
    pub uri: String,
    pub error: String,
}

/// What a materialization produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializeReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<DownloadFailure>,
}

impl MaterializeReport {
    pub fn count(&self) -> usize {
        self.written.len()
    }
}

/// Writes artifacts to a destination directory
pub struct Materializer<T: Transport> {
    client: Arc<LeapClient<T>>,
}

impl<T: Transport> Materializer<T> {
    pub fn new(client: Arc<LeapClient<T>>) -> Self {
        Self { client }
    }

    /// Stream every artifact into `dest`
    ///
    /// Only failing to create `dest` is an error; a failed download is
    /// recorded in the report and the remaining artifacts still run. Bytes
    /// go to a `.part` file that is renamed into place once complete, so a
    /// failure never touches a file already at the target path.
    pub async fn materialize(
        &self,
        artifacts: &[Artifact],
        dest: &Path,
        naming: &NamingScheme,
    ) -> Result<MaterializeReport, ApiError> {
        tokio::fs::create_dir_all(dest).await?;

        let mut report = MaterializeReport::default();
        for (i, artifact) in artifacts.iter().enumerate() {
            let path = dest.join(naming.file_name(i + 1));
            match self.write_one(&artifact.uri, &path).await {
                Ok(bytes) => {
                    debug!("Wrote {} bytes to {}", bytes, path.display());
                    report.written.push(path);
                }
                Err(e) => {
                    warn!(uri = %artifact.uri, error = %e, "Failed to materialize artifact");
                    report.failures.push(DownloadFailure {
                        uri: artifact.uri.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn write_one(&self, uri: &str, path: &Path) -> Result<u64, ApiError> {
        let stream = self.client.transport().download(uri).await?;
        let partial = partial_path(path);
        let result = async {
            let written = stream_to_file(stream, &partial).await?;
            tokio::fs::rename(&partial, path).await?;
            Ok::<_, ApiError>(written)
        }
        .await;

        if result.is_err() {
            match tokio::fs::remove_file(&partial).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %partial.display(), error = %e, "Could not remove partial file"),
            }
        }
        result
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

async fn stream_to_file(mut stream: ByteStream, path: &Path) -> Result<u64, ApiError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
