//! Bounded, cancellable status polling

use crate::api::ApiError;
use crate::core::{JobState, JobStatus, RetryPolicy, Termination};
use std::future::Future;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a poll ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The success predicate fired
    Success(JobStatus),
    /// The failure predicate fired
    Failed(JobStatus),
    /// Attempts or deadline exhausted with no terminal predicate firing
    TimedOut {
        attempts: u32,
        last: Option<JobStatus>,
    },
    /// Cancellation was observed during a wait or a fetch
    Cancelled,
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Poll `fetch` until a termination predicate fires
///
/// Every attempt waits `policy.interval` first, then fetches. The failure
/// predicate is evaluated before the success predicate. Transient fetch
/// errors use up the attempt and polling continues; any other error is
/// returned. `fetch` receives the 1-based attempt number.
pub async fn poll<F, Fut>(
    mut fetch: F,
    termination: &Termination,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<PollOutcome, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<JobStatus, ApiError>>,
{
    let deadline = policy.deadline.map(|d| Instant::now() + d);
    let mut last = None;

    for attempt in 1..=policy.max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
            _ = deadline_reached(deadline) => {
                return Ok(PollOutcome::TimedOut { attempts: attempt - 1, last });
            }
            _ = sleep(policy.interval) => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
            _ = deadline_reached(deadline) => {
                return Ok(PollOutcome::TimedOut { attempts: attempt, last });
            }
            result = fetch(attempt) => result,
        };

        match result {
            Ok(status) => {
                if termination.is_failure(&status) {
                    return Ok(PollOutcome::Failed(status));
                }
                if termination.is_success(&status) {
                    return Ok(PollOutcome::Success(status));
                }
                if status.state == JobState::Finished && status.artifacts.is_empty() {
                    warn!(attempt, "Job reports finished without artifacts, still polling");
                } else {
                    debug!(attempt, state = %status.state, "Job not terminal yet");
                }
                last = Some(status);
            }
            Err(e) if e.is_transient() => {
                warn!(attempt, error = %e, "Transient error while polling");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(PollOutcome::TimedOut {
        attempts: policy.max_attempts,
        last,
    })
}
