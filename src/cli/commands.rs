//! CLI command definitions

use crate::api::wire::{ImageJobRequest, ModelCreateRequest, RemixRequest, TrainingRequest};
use crate::api::{RemixSource, SampleSource};
use crate::core::catalog::{RemixMode, Sampler, SubjectType, Upscale};
use crate::core::PreTrainedModel;
use crate::execution::{FineTuneSpec, SchedulingStrategy};
use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_NEGATIVE_PROMPT: &str = "asymmetric, bad hair, misshapen hands, too many fingers, \
     malformed bodies, too many bodies, disfigured, more than one head";
pub const DEFAULT_REMIX_NEGATIVE_PROMPT: &str = "Disfigured, asymmetric";
pub const DEFAULT_SEED: u64 = 4523184;

/// Create, train and optionally use a fine-tuned model
#[derive(Debug, Args, Clone)]
pub struct FineTuneCommand {
    /// Model title
    #[arg(long)]
    pub title: String,

    /// Keyword the prompts use to refer to the subject
    #[arg(long)]
    pub keyword: String,

    /// Rare token identifying the subject
    #[arg(long)]
    pub identifier: Option<String>,

    #[arg(long, default_value_t = SubjectType::Person)]
    pub subject_type: SubjectType,

    /// Local image path or http(s) URL; repeat for more samples
    #[arg(long = "sample", value_parser = parse_sample)]
    pub samples: Vec<SampleSource>,

    /// Base weights to train from, by catalog name or id
    #[arg(long)]
    pub base_model: Option<String>,

    #[arg(long)]
    pub training_steps: Option<u32>,

    /// Prompt to generate with once training finishes
    #[arg(long)]
    pub generate: Option<String>,

    /// Number of images for --generate
    #[arg(long, default_value_t = 1)]
    pub images: u32,

    /// Delete the model at the end of the run
    #[arg(long)]
    pub delete_after: bool,
}

impl FineTuneCommand {
    pub fn to_spec(&self) -> FineTuneSpec {
        let mut model = ModelCreateRequest::new(&self.title, &self.keyword);
        model.subject_identifier = self.identifier.clone();
        model.subject_type = Some(self.subject_type);

        let base = self
            .base_model
            .as_deref()
            .map(PreTrainedModel::resolve)
            .unwrap_or_else(|| PreTrainedModel::default().id().to_string());
        let mut training = TrainingRequest::new(base);
        training.steps = self.training_steps;

        FineTuneSpec {
            model,
            samples: self.samples.clone(),
            training,
            generate: self
                .generate
                .as_deref()
                .map(|prompt| default_image_request(prompt, self.images)),
            delete_after: self.delete_after,
        }
    }
}

/// Generate images
#[derive(Debug, Args, Clone)]
pub struct GenerateCommand {
    #[arg(long)]
    pub prompt: String,

    /// Catalog name or model id; the configured default when omitted
    #[arg(long, conflicts_with = "all_models")]
    pub model: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub images: u32,

    /// Run the prompt against every pre-trained model
    #[arg(long)]
    pub all_models: bool,

    /// How --all-models runs are scheduled
    #[arg(long, value_enum, default_value_t = StrategyArg::Sequential)]
    pub strategy: StrategyArg,

    #[arg(long, default_value = DEFAULT_NEGATIVE_PROMPT)]
    pub negative_prompt: String,

    #[arg(long, default_value_t = 50)]
    pub steps: u32,

    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    #[arg(long, default_value_t = 1024)]
    pub height: u32,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    #[arg(long, default_value_t = Sampler::Ddim)]
    pub sampler: Sampler,

    #[arg(long, default_value_t = 15)]
    pub prompt_strength: u32,

    #[arg(long, default_value_t = Upscale::X1)]
    pub upscale: Upscale,
}

impl GenerateCommand {
    pub fn to_request(&self) -> ImageJobRequest {
        let mut request = default_image_request(&self.prompt, self.images)
            .with_steps(self.steps)
            .with_size(self.width, self.height);
        request.negative_prompt = Some(self.negative_prompt.clone());
        request.seed = Some(self.seed);
        request.sampler = Some(self.sampler);
        request.prompt_strength = Some(self.prompt_strength);
        request.upscale_by = Some(self.upscale);
        request
    }

    /// Catalog names for an --all-models run
    pub fn fan_out_models(&self) -> Vec<String> {
        PreTrainedModel::ALL
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }
}

/// Remix an image
#[derive(Debug, Args, Clone)]
pub struct RemixCommand {
    #[arg(long)]
    pub prompt: String,

    /// Local source image
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    pub file: Option<PathBuf>,

    /// Remote source image
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, default_value_t = RemixMode::Canny)]
    pub mode: RemixMode,

    #[arg(long, default_value_t = 4)]
    pub images: u32,

    #[arg(long, default_value_t = 25)]
    pub steps: u32,

    #[arg(long, default_value = DEFAULT_REMIX_NEGATIVE_PROMPT)]
    pub negative_prompt: String,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl RemixCommand {
    pub fn to_request(&self) -> RemixRequest {
        let mut request = RemixRequest::new(&self.prompt);
        request.mode = Some(self.mode);
        request.number_of_images = Some(self.images);
        request.steps = Some(self.steps);
        request.negative_prompt = Some(self.negative_prompt.clone());
        request.seed = self.seed;
        request
    }

    pub fn source(&self) -> RemixSource {
        match (&self.file, &self.url) {
            (Some(path), _) => RemixSource::File(path.clone()),
            (None, Some(url)) => RemixSource::Url(url.clone()),
            // clap requires one of the two
            (None, None) => RemixSource::File(PathBuf::new()),
        }
    }
}

/// Delete image jobs
#[derive(Debug, Args, Clone)]
pub struct DeleteJobsCommand {
    /// Catalog names or ids; every pre-trained model when omitted
    #[arg(long = "model")]
    pub models: Vec<String>,
}

impl DeleteJobsCommand {
    pub fn targets(&self) -> Vec<String> {
        if self.models.is_empty() {
            PreTrainedModel::ALL.iter().map(|m| m.id().to_string()).collect()
        } else {
            self.models.clone()
        }
    }
}

/// Delete a project
#[derive(Debug, Args, Clone)]
pub struct DeleteProjectCommand {
    #[arg(long)]
    pub project_id: String,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl StrategyArg {
    /// `limit` bounds the parallel-limited strategy
    pub fn into_strategy(self, limit: usize) -> SchedulingStrategy {
        match self {
            StrategyArg::Sequential => SchedulingStrategy::Sequential,
            StrategyArg::Parallel => SchedulingStrategy::Parallel,
            StrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(limit.max(1)),
        }
    }
}

/// The request the interactive driver used for its image jobs
pub fn default_image_request(prompt: &str, images: u32) -> ImageJobRequest {
    let mut request = ImageJobRequest::new(prompt)
        .with_images(images)
        .with_steps(50)
        .with_size(1024, 1024);
    request.negative_prompt = Some(DEFAULT_NEGATIVE_PROMPT.to_string());
    request.prompt_strength = Some(15);
    request.enhance_prompt = Some(true);
    request.restore_faces = Some(true);
    request.seed = Some(DEFAULT_SEED);
    request.upscale_by = Some(Upscale::X1);
    request.sampler = Some(Sampler::Ddim);
    request
}

/// http(s) values are URLs, anything else a local path
pub fn parse_sample(s: &str) -> Result<SampleSource, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("sample must not be empty".to_string());
    }
    let lower = s.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(SampleSource::Url(s.to_string()))
    } else {
        Ok(SampleSource::File(PathBuf::from(s)))
    }
}
