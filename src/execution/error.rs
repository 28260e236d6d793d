//! Pipeline failures

use crate::api::ApiError;
use crate::core::{JobState, PipelineKind, Stage};
use thiserror::Error;

/// Why a stage could not complete
#[derive(Debug, Error)]
pub enum FailureKind {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("job {job_id} ended in state '{state}'")]
    JobFailed { job_id: String, state: JobState },

    #[error("job {job_id} did not finish after {attempts} attempts")]
    TimedOut { job_id: String, attempts: u32 },

    #[error("cancelled")]
    Cancelled,

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("no samples could be uploaded")]
    NoSamples,

    #[error("could not write results: {0}")]
    Materialize(String),

    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),
}

/// A pipeline halted at `stage`
#[derive(Debug, Error)]
#[error("{pipeline} pipeline halted at {stage} (resource '{resource_id}'): {kind}")]
pub struct PipelineError {
    pub pipeline: PipelineKind,
    pub stage: Stage,
    pub resource_id: String,
    #[source]
    pub kind: FailureKind,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, FailureKind::Cancelled)
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self.kind, FailureKind::TimedOut { .. })
    }

    /// The underlying API error, if that is what halted the run
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.kind {
            FailureKind::Api(e) => Some(e),
            _ => None,
        }
    }
}
