//! Pipeline tuning knobs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use plotbuilder_core::error::CoreError;
use serde::Serialize;

/// Default capacity of both the job and completion queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default pause between render attempts when retries are enabled.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// What `submit` does when the job queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Fail immediately with `SubmitError::Overloaded`.
    #[default]
    Reject,
    /// Wait, without a deadline, until a slot frees.
    Block,
}

impl AdmissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPolicy::Reject => "reject",
            AdmissionPolicy::Block => "block",
        }
    }
}

impl fmt::Display for AdmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdmissionPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(AdmissionPolicy::Reject),
            "block" => Ok(AdmissionPolicy::Block),
            other => Err(CoreError::Validation(format!(
                "Invalid admission policy '{other}'. Must be one of: reject, block"
            ))),
        }
    }
}

/// How many times a worker tries to render a job before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub job_queue_capacity: usize,
    pub completion_queue_capacity: usize,
    pub admission_policy: AdmissionPolicy,
    /// Cap on simultaneously running renders. `None` means one task per job
    /// with no upper bound.
    pub concurrency_limit: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            job_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            completion_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            admission_policy: AdmissionPolicy::default(),
            concurrency_limit: None,
            retry: RetryPolicy::default(),
        }
    }
}
