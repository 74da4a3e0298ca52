//! Runner types

use crate::job::JobId;

/// Configuration for a local job run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Attempts per task before the job fails
    pub max_task_attempts: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_task_attempts: 2,
        }
    }
}

impl RunnerConfig {
    /// Create a new runner config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set attempts per task (at least one)
    #[must_use]
    pub fn with_max_task_attempts(mut self, attempts: u32) -> Self {
        self.max_task_attempts = attempts.max(1);
        self
    }
}

/// Result of one committed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Task number
    pub task: u32,
    /// Attempt that committed
    pub attempt: u32,
    /// Records written by that attempt
    pub records: u64,
    /// Whether the attempt had output to commit
    pub committed: bool,
}

/// Statistics from a finished job
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Job id
    pub job_id: JobId,
    /// One entry per task, ordered by task number
    pub tasks: Vec<TaskReport>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl JobReport {
    /// Records written across all tasks
    pub fn records_written(&self) -> u64 {
        self.tasks.iter().map(|t| t.records).sum()
    }

    /// Attempts that failed and were retried
    pub fn retried_attempts(&self) -> u32 {
        self.tasks.iter().map(|t| t.attempt).sum()
    }
}
