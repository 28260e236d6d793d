//! Endpoint path templates
//!
//! Every path is built from the configured API version and the ids passed
//! in. Nothing here touches the network or holds mutable state.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_version: String,
}

impl Endpoints {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
        }
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    fn models_root(&self) -> String {
        format!("/api/{}/images/models", self.api_version)
    }

    /// Create a model (POST) or list models (GET)
    pub fn models(&self) -> String {
        self.models_root()
    }

    /// Get or delete a single model
    pub fn model(&self, model_id: &str) -> String {
        format!("{}/{}", self.models_root(), model_id)
    }

    /// Queue a training run for a model
    pub fn training_queue(&self, model_id: &str) -> String {
        format!("{}/queue", self.model(model_id))
    }

    /// Upload samples as multipart (POST) or list them (GET)
    pub fn samples(&self, model_id: &str) -> String {
        format!("{}/samples", self.model(model_id))
    }

    pub fn samples_from_url(&self, model_id: &str) -> String {
        format!("{}/samples/url", self.model(model_id))
    }

    pub fn sample(&self, model_id: &str, sample_id: &str) -> String {
        format!("{}/samples/{}", self.model(model_id), sample_id)
    }

    pub fn sample_archive(&self, model_id: &str, sample_id: &str) -> String {
        format!("{}/archive", self.sample(model_id, sample_id))
    }

    pub fn versions(&self, model_id: &str) -> String {
        format!("{}/versions", self.model(model_id))
    }

    pub fn version(&self, model_id: &str, version_id: &str) -> String {
        format!("{}/versions/{}", self.model(model_id), version_id)
    }

    /// Create an image job (POST) or list a model's jobs (GET)
    pub fn image_jobs(&self, model_id: &str) -> String {
        format!("{}/inferences", self.model(model_id))
    }

    /// Get or delete a single image job
    pub fn image_job(&self, model_id: &str, job_id: &str) -> String {
        format!("{}/inferences/{}", self.model(model_id), job_id)
    }

    pub fn remix_from_file(&self, model_id: &str) -> String {
        format!("{}/remix", self.model(model_id))
    }

    pub fn remix_from_url(&self, model_id: &str) -> String {
        format!("{}/remix/url", self.model(model_id))
    }

    pub fn remix_job(&self, model_id: &str, remix_id: &str) -> String {
        format!("{}/remix/{}", self.model(model_id), remix_id)
    }

    /// Deleting a project removes its models, jobs and keys
    pub fn project(&self, project_id: &str) -> String {
        format!("/api/{}/projects/{}", self.api_version, project_id)
    }
}
