//! Pipeline and stage state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Pipeline reached its last stage
    Completed,
    /// Pipeline halted on an unrecovered error
    Failed,
    /// Pipeline observed a cancellation signal
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// The named pipelines the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineKind {
    FineTune,
    ImageGeneration,
    Remix,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineKind::FineTune => "fine-tune",
            PipelineKind::ImageGeneration => "image-generation",
            PipelineKind::Remix => "remix",
        };
        f.write_str(name)
    }
}

/// A named stage of a pipeline
///
/// Fine-tuning walks `Created` through `SamplesArchived` and optionally
/// `ImageGenerated` and `Deleted`. Image generation and remix walk
/// `Submitted`, `Polling`, `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Created,
    SamplesUploading,
    SamplesVerified,
    TrainingQueued,
    TrainingPolling,
    TrainingFinished,
    SamplesArchived,
    ImageGenerated,
    Deleted,
    Submitted,
    Polling,
    Completed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Created => "Created",
            Stage::SamplesUploading => "SamplesUploading",
            Stage::SamplesVerified => "SamplesVerified",
            Stage::TrainingQueued => "TrainingQueued",
            Stage::TrainingPolling => "TrainingPolling",
            Stage::TrainingFinished => "TrainingFinished",
            Stage::SamplesArchived => "SamplesArchived",
            Stage::ImageGenerated => "ImageGenerated",
            Stage::Deleted => "Deleted",
            Stage::Submitted => "Submitted",
            Stage::Polling => "Polling",
            Stage::Completed => "Completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a stage was entered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub entered_at: DateTime<Utc>,
}
