//! Pipeline context - the accumulator threaded through one run

use crate::core::job::JobHandle;
use crate::core::state::{ExecutionStatus, PipelineKind, Stage, StageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution context for a pipeline run
///
/// Owned by the engine for the lifetime of a single run and never shared
/// between runs. Returned to the caller as part of the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineContext {
    /// Unique run ID
    pub run_id: Uuid,

    pub pipeline: PipelineKind,

    /// Model the pipeline operates on
    pub resource_id: Option<String>,

    /// Job currently being driven, if any
    pub handle: Option<JobHandle>,

    /// Samples accepted by the upload calls
    pub uploaded: usize,

    /// Samples the service reports for the model
    pub verified: usize,

    /// Samples archived after training
    pub archived: usize,

    pub status: ExecutionStatus,

    /// Stages entered, in order
    pub stages: Vec<StageRecord>,

    /// Reason the run halted
    pub failure: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineContext {
    pub fn new(pipeline: PipelineKind) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline,
            resource_id: None,
            handle: None,
            uploaded: 0,
            verified: 0,
            archived: 0,
            status: ExecutionStatus::Pending,
            stages: Vec::new(),
            failure: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Run against an existing model
    pub fn for_resource(pipeline: PipelineKind, resource_id: impl Into<String>) -> Self {
        let mut ctx = Self::new(pipeline);
        ctx.resource_id = Some(resource_id.into());
        ctx
    }

    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Record entry into a stage
    pub fn enter(&mut self, stage: Stage) {
        self.stages.push(StageRecord {
            stage,
            entered_at: Utc::now(),
        });
    }

    pub fn current_stage(&self) -> Option<Stage> {
        self.stages.last().map(|r| r.stage)
    }

    pub fn has_reached(&self, stage: Stage) -> bool {
        self.stages.iter().any(|r| r.stage == stage)
    }

    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.failure = Some(reason.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = ExecutionStatus::Cancelled;
        self.failure = Some("cancelled".to_string());
        self.completed_at = Some(Utc::now());
    }

    /// Resource id, or an empty string before one exists
    pub fn resource(&self) -> &str {
        self.resource_id.as_deref().unwrap_or_default()
    }
}
