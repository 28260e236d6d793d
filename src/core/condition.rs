//! Termination conditions for polling

use crate::core::job::JobStatus;
use std::fmt;

type Predicate = Box<dyn Fn(&JobStatus) -> bool + Send + Sync>;

/// Success and failure predicates evaluated against each fetched status
///
/// The failure predicate is always checked first.
pub struct Termination {
    is_success: Predicate,
    is_failure: Predicate,
}

impl Termination {
    pub fn new<S, F>(is_success: S, is_failure: F) -> Self
    where
        S: Fn(&JobStatus) -> bool + Send + Sync + 'static,
        F: Fn(&JobStatus) -> bool + Send + Sync + 'static,
    {
        Self {
            is_success: Box::new(is_success),
            is_failure: Box::new(is_failure),
        }
    }

    /// Finished with artifacts succeeds; failed or not found fails
    pub fn finished_with_artifacts() -> Self {
        Self::new(JobStatus::is_complete, JobStatus::is_failure)
    }

    pub fn is_success(&self, status: &JobStatus) -> bool {
        (self.is_success)(status)
    }

    pub fn is_failure(&self, status: &JobStatus) -> bool {
        (self.is_failure)(status)
    }
}

impl Default for Termination {
    fn default() -> Self {
        Self::finished_with_artifacts()
    }
}

impl fmt::Debug for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Termination").finish_non_exhaustive()
    }
}
