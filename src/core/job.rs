//! Job handles and normalized job status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of long-running work a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    FineTune,
    ImageGeneration,
    Remix,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::FineTune => "fine-tune",
            JobKind::ImageGeneration => "image",
            JobKind::Remix => "remix",
        };
        f.write_str(name)
    }
}

/// Identifies a submitted job
///
/// `resource_id` is the model the job runs against; `id` is the job (or
/// model version) id returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub resource_id: String,
    pub kind: JobKind,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, resource_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            resource_id: resource_id.into(),
            kind,
        }
    }
}

/// Normalized state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Failed,
    NotFound,
    Unknown,
}

impl JobState {
    /// Map a wire value; anything unrecognized becomes `Unknown`
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => JobState::Queued,
            "running" | "processing" | "training" => JobState::Running,
            "finished" | "completed" => JobState::Finished,
            "failed" => JobState::Failed,
            "not found" | "not_found" => JobState::NotFound,
            _ => JobState::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed | JobState::NotFound)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
            JobState::NotFound => "not found",
            JobState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A produced output referenced by a retrievable address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub uri: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Artifact {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            created_at: None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let uri = value.get("uri")?.as_str()?.trim();
        if uri.is_empty() {
            return None;
        }
        let created_at = value
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Some(Self {
            uri: uri.to_string(),
            created_at,
        })
    }
}

/// One observation of a job, produced by each poll
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    pub artifacts: Vec<Artifact>,

    /// Fields not folded into `state` or `artifacts`
    pub raw: Map<String, Value>,
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Unknown
    }
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Normalize a job body
    ///
    /// Image jobs report `state`, remix jobs and model versions report
    /// `status`. Artifacts come from an `images` array or, for a trained
    /// version, from its `weights` object.
    pub fn from_value(value: Value) -> Self {
        let mut raw = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let state = ["state", "status"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_str))
            .map(JobState::from_wire)
            .unwrap_or(JobState::Unknown);
        raw.remove("state");
        raw.remove("status");

        let mut artifacts: Vec<Artifact> = match raw.remove("images") {
            Some(Value::Array(images)) => images.iter().filter_map(Artifact::from_value).collect(),
            _ => Vec::new(),
        };
        if artifacts.is_empty() {
            if let Some(weights) = raw.get("weights").and_then(Artifact::from_value) {
                artifacts.push(weights);
            }
        }

        Self {
            state,
            artifacts,
            raw,
        }
    }

    /// A finished job without artifacts is inconsistent, not successful
    pub fn is_complete(&self) -> bool {
        self.state == JobState::Finished && !self.artifacts.is_empty()
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.state, JobState::Failed | JobState::NotFound)
    }
}
