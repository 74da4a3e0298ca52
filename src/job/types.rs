//! Job and task attempt identifiers

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap an existing job id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a job id from the current UTC time
    pub fn generate() -> Self {
        Self(format!("job_{}", Utc::now().format("%Y%m%d%H%M%S%3f")))
    }

    /// The raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one execution attempt of one task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskAttemptId {
    pub job_id: JobId,
    pub task: u32,
    pub attempt: u32,
}

impl TaskAttemptId {
    /// Create an attempt id
    pub fn new(job_id: JobId, task: u32, attempt: u32) -> Self {
        Self {
            job_id,
            task,
            attempt,
        }
    }
}

impl fmt::Display for TaskAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt_{}_{:06}_{}", self.job_id, self.task, self.attempt)
    }
}

/// Final state a job is aborted with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Failed,
    Killed,
}
