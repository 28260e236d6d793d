//! Job submission - validated requests in, job handles out

use crate::api::wire::{ImageJobRequest, ModelCreateRequest, RemixRequest, TrainingRequest};
use crate::api::{ApiError, LeapClient, RemixSource, Transport};
use crate::core::{JobHandle, JobKind, PreTrainedModel};
use std::sync::Arc;
use tracing::info;

/// Submits work and turns responses into [`JobHandle`]s
///
/// Preconditions are checked before any network call. Submission is not
/// idempotent: calling twice creates two jobs.
pub struct JobSubmitter<T: Transport> {
    client: Arc<LeapClient<T>>,
}

impl<T: Transport> Clone for JobSubmitter<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<T: Transport> JobSubmitter<T> {
    pub fn new(client: Arc<LeapClient<T>>) -> Self {
        Self { client }
    }

    /// The explicit target, else the configured default model
    ///
    /// Catalog names resolve to their ids.
    pub fn resolve_target(&self, target: Option<&str>) -> Result<String, ApiError> {
        target
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(PreTrainedModel::resolve)
            .or_else(|| {
                self.client
                    .config()
                    .default_model_id
                    .clone()
                    .filter(|id| !id.trim().is_empty())
            })
            .ok_or_else(|| ApiError::validation("modelId", "no target model and no default configured"))
    }

    /// Create a fine-tunable model and return its id
    pub async fn create_model(&self, request: &ModelCreateRequest) -> Result<String, ApiError> {
        request.validate()?;
        let model = self.client.create_model(request).await?;
        let id = required_id(self.client.endpoints().models(), model.id)?;
        info!(model_id = %id, "Created model '{}'", request.title);
        Ok(id)
    }

    /// Queue training; the handle id is the new model version id
    pub async fn queue_training(
        &self,
        model_id: &str,
        request: &TrainingRequest,
    ) -> Result<JobHandle, ApiError> {
        request.validate()?;
        let version = self.client.queue_training(model_id, request).await?;
        let id = required_id(self.client.endpoints().training_queue(model_id), version.id)?;
        info!(model_id, version_id = %id, "Queued training");
        Ok(JobHandle::new(id, model_id, JobKind::FineTune))
    }

    pub async fn submit_image(
        &self,
        target: Option<&str>,
        request: &ImageJobRequest,
    ) -> Result<JobHandle, ApiError> {
        let model_id = self.resolve_target(target)?;
        request.validate()?;
        let job = self.client.create_image_job(&model_id, request).await?;
        let id = required_id(self.client.endpoints().image_jobs(&model_id), job.id)?;
        info!(model_id = %model_id, job_id = %id, "Submitted image job");
        Ok(JobHandle::new(id, model_id, JobKind::ImageGeneration))
    }

    pub async fn submit_remix(
        &self,
        target: Option<&str>,
        request: &RemixRequest,
        source: &RemixSource,
    ) -> Result<JobHandle, ApiError> {
        let model_id = self.resolve_target(target)?;
        request.validate()?;
        let job = self.client.create_remix(&model_id, request, source).await?;
        let path = match source {
            RemixSource::File(_) => self.client.endpoints().remix_from_file(&model_id),
            RemixSource::Url(_) => self.client.endpoints().remix_from_url(&model_id),
        };
        let id = required_id(path, job.id)?;
        info!(model_id = %model_id, job_id = %id, "Submitted remix job");
        Ok(JobHandle::new(id, model_id, JobKind::Remix))
    }
}

fn required_id(path: String, id: Option<String>) -> Result<String, ApiError> {
    id.filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::protocol(path, "response carried no id"))
}
