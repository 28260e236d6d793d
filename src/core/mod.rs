//! Core domain models
//!
//! This module defines jobs and their observed status, retry policies,
//! pipeline stages and the per-run context, plus the model catalog and
//! run configuration.

pub mod catalog;
pub mod condition;
pub mod config;
pub mod context;
pub mod job;
pub mod policy;
pub mod state;

pub use catalog::PreTrainedModel;
pub use condition::Termination;
pub use config::RunConfig;
pub use context::PipelineContext;
pub use job::*;
pub use policy::RetryPolicy;
pub use state::*;
