//! Pipeline execution engine

pub mod engine;
pub mod error;
pub mod materializer;
pub mod poller;
pub mod samples;
pub mod scheduler;
pub mod submitter;

pub use engine::{EventHandler, FineTuneSpec, PipelineEngine, PipelineEvent, RunReport};
pub use error::{FailureKind, PipelineError};
pub use materializer::{DownloadFailure, MaterializeReport, Materializer, NamingScheme};
pub use poller::{poll, PollOutcome};
pub use samples::{NoMoreSamples, QueuedSamples, SampleProvider};
pub use scheduler::SchedulingStrategy;
pub use submitter::JobSubmitter;
