//! Output format, record writer and committer traits
//!
//! These are the three capabilities a job driver uses to produce output:
//! validate the output specification once, obtain one record writer per task
//! attempt, and drive the commit protocol through a committer.

use crate::error::Result;
use crate::job::{JobContext, JobState, TaskAttemptContext};
use crate::types::JsonValue;
use async_trait::async_trait;
use std::sync::Arc;

/// Writes the records of exactly one task attempt
///
/// Writers are owned by a single task and need no internal locking.
#[async_trait]
pub trait RecordWriter: Send {
    /// Append one record
    async fn write(&mut self, record: &JsonValue) -> Result<()>;

    /// Flush and close the writer, returning the number of records written
    ///
    /// Takes `Box<Self>` to support trait objects.
    async fn close(self: Box<Self>) -> Result<u64>;
}

/// Commit protocol for a job and its task attempts
#[async_trait]
pub trait OutputCommitter: Send + Sync {
    /// Called once by the driver before any task runs
    async fn setup_job(&self, job: &JobContext) -> Result<()>;

    /// Called by each task attempt before it writes
    async fn setup_task(&self, task: &TaskAttemptContext) -> Result<()>;

    /// Whether the attempt produced output that must be committed
    async fn needs_task_commit(&self, task: &TaskAttemptContext) -> Result<bool>;

    /// Make an attempt's output part of the job output
    async fn commit_task(&self, task: &TaskAttemptContext) -> Result<()>;

    /// Discard an attempt's output
    async fn abort_task(&self, task: &TaskAttemptContext) -> Result<()>;

    /// Called once after every task committed
    async fn commit_job(&self, job: &JobContext) -> Result<()>;

    /// Called once when the job failed or was killed
    async fn abort_job(&self, job: &JobContext, state: JobState) -> Result<()>;
}

/// A pluggable output format
#[async_trait]
pub trait OutputFormat: Send + Sync {
    /// Registry name of this format
    fn name(&self) -> &str;

    /// Pre-flight validation, run once before any task writes
    async fn check_output_specs(&self, context: &TaskAttemptContext) -> Result<()>;

    /// Record writer bound to one task attempt
    async fn get_record_writer(&self, context: &TaskAttemptContext)
        -> Result<Box<dyn RecordWriter>>;

    /// Committer for the job and its task attempts
    async fn get_output_committer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Arc<dyn OutputCommitter>>;
}
