//! Retry policies for polling and per-item retries

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// How often and how long to keep asking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Wait before every attempt, including the first
    #[serde(rename = "interval_secs", with = "secs")]
    pub interval: Duration,

    pub max_attempts: u32,

    /// Wall-clock bound on the whole poll, independent of attempts
    #[serde(
        rename = "deadline_secs",
        with = "opt_secs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Image jobs: 5s, 20 attempts
    pub fn image() -> Self {
        Self::new(Duration::from_secs(5), 20)
    }

    /// Remix jobs: 5s, 50 attempts
    pub fn remix() -> Self {
        Self::new(Duration::from_secs(5), 50)
    }

    /// Training: 5s, 720 attempts (one hour)
    pub fn training() -> Self {
        Self::new(Duration::from_secs(5), 720)
    }

    /// Per-sample archive calls
    pub fn archive() -> Self {
        Self::new(Duration::from_secs(1), 3)
    }

    /// Upper bound on how long the policy can run
    pub fn budget(&self) -> Duration {
        let by_attempts = self.interval.saturating_mul(self.max_attempts);
        match self.deadline {
            Some(deadline) => by_attempts.min(deadline),
            None => by_attempts,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        if self.deadline == Some(Duration::ZERO) {
            anyhow::bail!("deadline_secs must be greater than zero");
        }
        Ok(())
    }
}

mod secs {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod opt_secs {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_secs))
    }
}
