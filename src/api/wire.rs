//! Request and response bodies exchanged with the service
//!
//! Optional request fields are skipped when unset so they never reach the
//! wire as `null`. Responses are lenient: every field is optional.

use crate::api::ApiError;
use crate::core::catalog::{RemixMode, Sampler, SubjectType, Upscale};
use serde::{Deserialize, Serialize};

pub const MAX_IMAGES: u32 = 4;
pub const MAX_STEPS: u32 = 100;
pub const MAX_DIMENSION: u32 = 1024;
pub const MAX_PROMPT_STRENGTH: u32 = 30;
pub const MIN_TRAINING_STEPS: u32 = 50;

fn require(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn check_images(value: Option<u32>) -> Result<(), ApiError> {
    match value {
        Some(0) => Err(ApiError::validation("numberOfImages", "must be at least 1")),
        Some(n) if n > MAX_IMAGES => Err(ApiError::validation(
            "numberOfImages",
            format!("{} exceeds the maximum of {}", n, MAX_IMAGES),
        )),
        _ => Ok(()),
    }
}

fn check_steps(value: Option<u32>) -> Result<(), ApiError> {
    match value {
        Some(n) if n > MAX_STEPS => Err(ApiError::validation(
            "steps",
            format!("{} exceeds the maximum of {}", n, MAX_STEPS),
        )),
        _ => Ok(()),
    }
}

fn check_dimension(field: &'static str, value: Option<u32>) -> Result<(), ApiError> {
    match value {
        Some(n) if n == 0 || n > MAX_DIMENSION => Err(ApiError::validation(
            field,
            format!("{} is outside 8..={}", n, MAX_DIMENSION),
        )),
        Some(n) if n % 8 != 0 => Err(ApiError::validation(
            field,
            format!("{} is not a multiple of 8", n),
        )),
        _ => Ok(()),
    }
}

/// Body for creating a fine-tunable model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCreateRequest {
    pub title: String,

    /// Keyword used in prompts to trigger the learned subject
    pub subject_keyword: String,

    /// Random token the keyword is swapped for at inference time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_identifier: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<SubjectType>,
}

impl ModelCreateRequest {
    pub fn new(title: impl Into<String>, subject_keyword: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subject_keyword: subject_keyword.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("title", &self.title)?;
        require("subjectKeyword", &self.subject_keyword)
    }
}

/// Body for queueing a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    /// Weights the new version starts from
    pub base_weights_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl TrainingRequest {
    pub fn new(base_weights_id: impl Into<String>) -> Self {
        Self {
            base_weights_id: base_weights_id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("baseWeightsId", &self.base_weights_id)?;
        match self.steps {
            Some(n) if n < MIN_TRAINING_STEPS => Err(ApiError::validation(
                "steps",
                format!("{} is below the minimum of {}", n, MIN_TRAINING_STEPS),
            )),
            _ => Ok(()),
        }
    }
}

/// Body for linking sample images by URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleUrlRequest {
    pub images: Vec<String>,
}

impl SampleUrlRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.images.is_empty() {
            return Err(ApiError::validation("images", "at least one URL is required"));
        }
        self.images.iter().try_for_each(|url| require("images", url))
    }
}

/// Body for an image generation job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageJobRequest {
    pub prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    /// Model version; the latest when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_images: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_strength: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_faces: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhance_prompt: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscale_by: Option<Upscale>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<Sampler>,
}

impl ImageJobRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_images(mut self, count: u32) -> Self {
        self.number_of_images = Some(count);
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("prompt", &self.prompt)?;
        check_images(self.number_of_images)?;
        check_steps(self.steps)?;
        check_dimension("width", self.width)?;
        check_dimension("height", self.height)?;
        match self.prompt_strength {
            Some(n) if n > MAX_PROMPT_STRENGTH => Err(ApiError::validation(
                "promptStrength",
                format!("{} exceeds the maximum of {}", n, MAX_PROMPT_STRENGTH),
            )),
            _ => Ok(()),
        }
    }
}

/// Body for a remix job
///
/// The URL variant sends this as JSON; the file variant sends
/// [`form_fields`](Self::form_fields) as multipart text parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemixRequest {
    pub prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_images: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RemixMode>,
}

impl RemixRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("prompt", &self.prompt)?;
        check_images(self.number_of_images)?;
        check_steps(self.steps)
    }

    /// Multipart text fields, keyed by wire name; unset fields are left out
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("prompt", self.prompt.clone())];
        let optional = [
            ("imageUrl", self.image_url.clone()),
            ("negativePrompt", self.negative_prompt.clone()),
            ("steps", self.steps.map(|v| v.to_string())),
            ("seed", self.seed.map(|v| v.to_string())),
            ("webhookUrl", self.webhook_url.clone()),
            ("numberOfImages", self.number_of_images.map(|v| v.to_string())),
            ("mode", self.mode.map(|v| v.as_str().to_string())),
        ];
        fields.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );
        fields
    }
}

/// A model as returned by create, list and get
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelResponse {
    pub id: Option<String>,
    pub title: Option<String>,
    pub subject_keyword: Option<String>,
    pub subject_identifier: Option<String>,
}

/// Model list wrapped in an object (`returnInObject=true`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelListObject {
    pub data: Option<Vec<ModelResponse>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeightsData {
    pub id: Option<String>,
    pub uri: Option<String>,
}

/// A trained (or training) model version; also the body returned by the
/// training queue endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelVersionResponse {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub status: Option<String>,
    pub model: Option<ModelResponse>,
    pub weights: Option<WeightsData>,
    pub steps: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageSampleResponse {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageData {
    pub id: Option<String>,
    pub uri: Option<String>,
    pub created_at: Option<String>,
}

/// An image job as returned by create and list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageJobResponse {
    pub id: Option<String>,
    pub status: Option<String>,
    pub state: Option<String>,
    pub prompt: Option<String>,
    pub model_id: Option<String>,
    pub created_at: Option<String>,
    pub images: Option<Vec<ImageData>>,
}

/// A remix job as returned by create and get
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemixJobResponse {
    pub id: Option<String>,
    pub status: Option<String>,
    pub prompt: Option<String>,
    pub source_image_uri: Option<String>,
    pub project_id: Option<String>,
    pub created_at: Option<String>,
    pub images: Option<Vec<ImageData>>,
}
