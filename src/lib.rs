//! leap-pipeline - drives fine-tuning, image generation and remix jobs on
//! the Leap image API from submission to files on disk

pub mod api;
pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use api::{ApiError, ClientConfig, HttpTransport, LeapClient, Transport};
pub use core::{ExecutionStatus, JobStatus, PipelineContext, RetryPolicy, RunConfig, Stage};
pub use execution::{PipelineEngine, PipelineError, PipelineEvent, RunReport, SchedulingStrategy};
