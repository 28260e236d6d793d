//! Typed operations over a [`Transport`]

use crate::api::wire::{
    ImageJobRequest, ImageJobResponse, ImageSampleResponse, ModelCreateRequest, ModelListObject,
    ModelResponse, ModelVersionResponse, RemixJobResponse, RemixRequest, SampleUrlRequest,
    TrainingRequest,
};
use crate::api::{
    ApiError, ApiRequest, ApiResponse, ClientConfig, Endpoints, FilePart, HttpTransport,
    MultipartForm, Transport,
};
use crate::core::job::{JobHandle, JobKind, JobState, JobStatus};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a training sample comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleSource {
    File(PathBuf),
    Url(String),
}

impl std::fmt::Display for SampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleSource::File(path) => write!(f, "{}", path.display()),
            SampleSource::Url(url) => f.write_str(url),
        }
    }
}

/// Source image for a remix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemixSource {
    File(PathBuf),
    Url(String),
}

/// Client for the image API
///
/// Holds the only copy of the configuration; cloning the transport is up
/// to the caller (wrap the client in an `Arc` to share it).
pub struct LeapClient<T: Transport = HttpTransport> {
    transport: T,
    endpoints: Endpoints,
    config: ClientConfig,
}

impl LeapClient<HttpTransport> {
    /// Create a client that talks HTTP
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> LeapClient<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        let endpoints = Endpoints::new(config.api_version.clone());
        Self {
            transport,
            endpoints,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ---- models ----

    pub async fn create_model(&self, request: &ModelCreateRequest) -> Result<ModelResponse, ApiError> {
        request.validate()?;
        let path = self.endpoints.models();
        self.call(ApiRequest::post(&path).with_json(to_json(&path, request)?)).await
    }

    /// List models as a bare array
    pub async fn list_models(&self) -> Result<Vec<ModelResponse>, ApiError> {
        let request = ApiRequest::get(self.endpoints.models()).with_query("returnInObject", "false");
        self.call(request).await
    }

    /// List models wrapped in `{ "data": [...] }`
    pub async fn list_models_object(&self) -> Result<ModelListObject, ApiError> {
        let request = ApiRequest::get(self.endpoints.models()).with_query("returnInObject", "true");
        self.call(request).await
    }

    pub async fn get_model(&self, model_id: &str) -> Result<ModelResponse, ApiError> {
        require_id("modelId", model_id)?;
        self.call(ApiRequest::get(self.endpoints.model(model_id))).await
    }

    pub async fn delete_model(&self, model_id: &str) -> Result<(), ApiError> {
        require_id("modelId", model_id)?;
        self.call_empty(ApiRequest::delete(self.endpoints.model(model_id))).await
    }

    // ---- samples ----

    /// Upload one local image as a training sample
    pub async fn upload_sample_file(
        &self,
        model_id: &str,
        file: &Path,
    ) -> Result<Vec<ImageSampleResponse>, ApiError> {
        require_id("modelId", model_id)?;
        let part = read_image_part("files", file).await?;
        let form = MultipartForm {
            fields: Vec::new(),
            files: vec![part],
        };
        self.call(ApiRequest::post(self.endpoints.samples(model_id)).with_multipart(form))
            .await
    }

    pub async fn upload_sample_urls(
        &self,
        model_id: &str,
        request: &SampleUrlRequest,
    ) -> Result<Vec<ImageSampleResponse>, ApiError> {
        require_id("modelId", model_id)?;
        request.validate()?;
        let path = self.endpoints.samples_from_url(model_id);
        self.call(ApiRequest::post(&path).with_json(to_json(&path, request)?)).await
    }

    pub async fn upload_sample(
        &self,
        model_id: &str,
        source: &SampleSource,
    ) -> Result<Vec<ImageSampleResponse>, ApiError> {
        match source {
            SampleSource::File(path) => self.upload_sample_file(model_id, path).await,
            SampleSource::Url(url) => {
                let request = SampleUrlRequest {
                    images: vec![url.clone()],
                };
                self.upload_sample_urls(model_id, &request).await
            }
        }
    }

    pub async fn list_samples(&self, model_id: &str) -> Result<Vec<ImageSampleResponse>, ApiError> {
        require_id("modelId", model_id)?;
        self.call(ApiRequest::get(self.endpoints.samples(model_id))).await
    }

    pub async fn get_sample(
        &self,
        model_id: &str,
        sample_id: &str,
    ) -> Result<ImageSampleResponse, ApiError> {
        require_id("modelId", model_id)?;
        require_id("sampleId", sample_id)?;
        self.call(ApiRequest::get(self.endpoints.sample(model_id, sample_id))).await
    }

    pub async fn archive_sample(&self, model_id: &str, sample_id: &str) -> Result<(), ApiError> {
        require_id("modelId", model_id)?;
        require_id("sampleId", sample_id)?;
        self.call_empty(ApiRequest::post(self.endpoints.sample_archive(model_id, sample_id)))
            .await
    }

    // ---- training ----

    pub async fn queue_training(
        &self,
        model_id: &str,
        request: &TrainingRequest,
    ) -> Result<ModelVersionResponse, ApiError> {
        require_id("modelId", model_id)?;
        request.validate()?;
        let path = self.endpoints.training_queue(model_id);
        self.call(ApiRequest::post(&path).with_json(to_json(&path, request)?)).await
    }

    pub async fn list_versions(&self, model_id: &str) -> Result<Vec<ModelVersionResponse>, ApiError> {
        require_id("modelId", model_id)?;
        self.call(ApiRequest::get(self.endpoints.versions(model_id))).await
    }

    pub async fn get_version(
        &self,
        model_id: &str,
        version_id: &str,
    ) -> Result<ModelVersionResponse, ApiError> {
        require_id("modelId", model_id)?;
        require_id("versionId", version_id)?;
        self.call(ApiRequest::get(self.endpoints.version(model_id, version_id))).await
    }

    // ---- image jobs ----

    pub async fn create_image_job(
        &self,
        model_id: &str,
        request: &ImageJobRequest,
    ) -> Result<ImageJobResponse, ApiError> {
        require_id("modelId", model_id)?;
        request.validate()?;
        let path = self.endpoints.image_jobs(model_id);
        self.call(ApiRequest::post(&path).with_json(to_json(&path, request)?)).await
    }

    pub async fn list_image_jobs(&self, model_id: &str) -> Result<Vec<ImageJobResponse>, ApiError> {
        require_id("modelId", model_id)?;
        self.call(ApiRequest::get(self.endpoints.image_jobs(model_id))).await
    }

    pub async fn get_image_job(
        &self,
        model_id: &str,
        job_id: &str,
    ) -> Result<ImageJobResponse, ApiError> {
        require_id("modelId", model_id)?;
        require_id("jobId", job_id)?;
        self.call(ApiRequest::get(self.endpoints.image_job(model_id, job_id))).await
    }

    pub async fn delete_image_job(&self, model_id: &str, job_id: &str) -> Result<(), ApiError> {
        require_id("modelId", model_id)?;
        require_id("jobId", job_id)?;
        self.call_empty(ApiRequest::delete(self.endpoints.image_job(model_id, job_id)))
            .await
    }

    // ---- remix ----

    /// Remix a local image; text fields and the file travel as multipart
    pub async fn create_remix_from_file(
        &self,
        model_id: &str,
        request: &RemixRequest,
        file: &Path,
    ) -> Result<RemixJobResponse, ApiError> {
        require_id("modelId", model_id)?;
        request.validate()?;
        let part = read_image_part("files", file).await?;
        let form = MultipartForm {
            fields: request.form_fields(),
            files: vec![part],
        };
        self.call(ApiRequest::post(self.endpoints.remix_from_file(model_id)).with_multipart(form))
            .await
    }

    /// Remix an image by URL; `image_url` is required
    pub async fn create_remix_from_url(
        &self,
        model_id: &str,
        request: &RemixRequest,
    ) -> Result<RemixJobResponse, ApiError> {
        require_id("modelId", model_id)?;
        request.validate()?;
        require_id("imageUrl", request.image_url.as_deref().unwrap_or_default())?;
        let path = self.endpoints.remix_from_url(model_id);
        self.call(ApiRequest::post(&path).with_json(to_json(&path, request)?)).await
    }

    pub async fn create_remix(
        &self,
        model_id: &str,
        request: &RemixRequest,
        source: &RemixSource,
    ) -> Result<RemixJobResponse, ApiError> {
        match source {
            RemixSource::File(path) => self.create_remix_from_file(model_id, request, path).await,
            RemixSource::Url(url) => {
                let mut request = request.clone();
                request.image_url = Some(url.clone());
                self.create_remix_from_url(model_id, &request).await
            }
        }
    }

    pub async fn get_remix_job(
        &self,
        model_id: &str,
        remix_id: &str,
    ) -> Result<RemixJobResponse, ApiError> {
        require_id("modelId", model_id)?;
        require_id("remixId", remix_id)?;
        self.call(ApiRequest::get(self.endpoints.remix_job(model_id, remix_id))).await
    }

    // ---- projects ----

    /// Removes the project's models, jobs and keys
    pub async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        require_id("projectId", project_id)?;
        self.call_empty(ApiRequest::delete(self.endpoints.project(project_id))).await
    }

    // ---- status ----

    /// Fetch and normalize the status of a submitted job
    ///
    /// A training version the service no longer knows reports `NotFound`
    /// instead of an error.
    pub async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, ApiError> {
        require_id("modelId", &handle.resource_id)?;
        require_id("jobId", &handle.id)?;
        let path = match handle.kind {
            JobKind::ImageGeneration => self.endpoints.image_job(&handle.resource_id, &handle.id),
            JobKind::Remix => self.endpoints.remix_job(&handle.resource_id, &handle.id),
            JobKind::FineTune => self.endpoints.version(&handle.resource_id, &handle.id),
        };

        match self.call::<serde_json::Value>(ApiRequest::get(&path)).await {
            Ok(body) => Ok(JobStatus::from_value(body)),
            Err(e) if handle.kind == JobKind::FineTune && e.status() == Some(404) => {
                debug!("Version {} not found for model {}", handle.id, handle.resource_id);
                Ok(JobStatus::new(JobState::NotFound))
            }
            Err(e) => Err(e),
        }
    }

    // ---- private helpers ----

    async fn call<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, ApiError> {
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        decode(&path, response)
    }

    async fn call_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        ensure_success(&path, response).map(|_| ())
    }
}

fn require_id(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn to_json<B: Serialize>(path: &str, body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::protocol(path, format!("encode failed: {}", e)))
}

/// Map a non-success status to [`ApiError::Transport`]
pub fn ensure_success(path: &str, response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ApiError::Transport {
        status: response.status,
        path: path.to_string(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}

/// Decode a success body; empty or malformed bodies are protocol errors
pub fn decode<R: DeserializeOwned>(path: &str, response: ApiResponse) -> Result<R, ApiError> {
    let response = ensure_success(path, response)?;
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::protocol(path, "empty body"));
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::protocol(path, format!("decode failed: {}", e)))
}

async fn read_image_part(field: &'static str, file: &Path) -> Result<FilePart, ApiError> {
    if !tokio::fs::try_exists(file).await.unwrap_or(false) {
        return Err(ApiError::validation(
            "file",
            format!("{} does not exist", file.display()),
        ));
    }
    let bytes = tokio::fs::read(file).await?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(FilePart {
        field,
        file_name,
        content_type: image_content_type(file),
        bytes: Bytes::from(bytes),
    })
}

fn image_content_type(file: &Path) -> String {
    let ext = file
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string());
    match ext.as_str() {
        "jpg" => "image/jpeg".to_string(),
        other => format!("image/{}", other),
    }
}
