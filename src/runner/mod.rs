//! Local job runner
//!
//! In-process driver for an output format. Drives the full protocol:
//!
//! 1. `check_output_specs` once, before anything is written
//! 2. `setup_job`
//! 3. every partition as its own tokio task, each with a bounded number of
//!    attempts (`setup_task`, write, close, `commit_task` or `abort_task`)
//! 4. `commit_job` when every task committed, `abort_job` otherwise
//!
//! # Overview
//!
//! - `LocalJobRunner` - Runs a job over in-memory partitions
//! - `RunnerConfig` - Attempt limits
//! - `JobReport`, `TaskReport` - What was written and committed

mod types;

pub use types::{JobReport, RunnerConfig, TaskReport};

use crate::error::{Error, Result};
use crate::job::{JobContext, JobState, TaskAttemptContext};
use crate::output::{OutputCommitter, OutputFormat};
use crate::types::JsonValue;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Split records into at most `tasks` contiguous partitions
///
/// Never returns empty partitions; no records yields no partitions.
pub fn partition_records(records: Vec<JsonValue>, tasks: usize) -> Vec<Vec<JsonValue>> {
    if records.is_empty() {
        return Vec::new();
    }
    let chunk = records.len().div_ceil(tasks.max(1));
    let mut partitions = Vec::new();
    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        partitions.push(records.by_ref().take(chunk).collect());
    }
    partitions
}

/// In-process job driver
pub struct LocalJobRunner {
    format: Arc<dyn OutputFormat>,
    config: RunnerConfig,
}

impl LocalJobRunner {
    /// Create a runner for an output format
    pub fn new(format: Arc<dyn OutputFormat>) -> Self {
        Self {
            format,
            config: RunnerConfig::default(),
        }
    }

    /// Set runner configuration
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the output-spec checks alone
    pub async fn validate(&self, job: &Arc<JobContext>) -> Result<()> {
        self.format.check_output_specs(&job.task_attempt(0, 0)).await
    }

    /// Run a job, one task per partition
    pub async fn run(
        &self,
        job: &Arc<JobContext>,
        partitions: Vec<Vec<JsonValue>>,
    ) -> Result<JobReport> {
        let start = Instant::now();
        let submit = job.task_attempt(0, 0);

        self.format.check_output_specs(&submit).await?;
        let committer = self.format.get_output_committer(&submit).await?;
        committer.setup_job(job).await?;

        info!(
            "Running job {} with {} tasks",
            job.job_id(),
            partitions.len()
        );

        let handles = partitions.into_iter().enumerate().map(|(task, records)| {
            let format = Arc::clone(&self.format);
            let committer = Arc::clone(&committer);
            let job = Arc::clone(job);
            let max_attempts = self.config.max_task_attempts;
            tokio::spawn(async move {
                run_task(format, committer, job, task as u32, records, max_attempts).await
            })
        });

        let mut tasks = Vec::new();
        let mut failure = None;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(report)) => tasks.push(report),
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    failure.get_or_insert(Error::Other(format!("Task panicked: {e}")));
                }
            }
        }

        if let Some(e) = failure {
            error!("Job {} failed: {e}", job.job_id());
            abort(committer.as_ref(), job, JobState::Failed).await;
            return Err(e);
        }

        if let Err(e) = committer.commit_job(job).await {
            error!("Job {} failed to commit: {e}", job.job_id());
            abort(committer.as_ref(), job, JobState::Failed).await;
            return Err(e);
        }

        tasks.sort_by_key(|t| t.task);
        let report = JobReport {
            job_id: job.job_id().clone(),
            tasks,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Job {} committed: {} records in {}ms",
            report.job_id,
            report.records_written(),
            report.duration_ms
        );
        Ok(report)
    }
}

async fn abort(committer: &dyn OutputCommitter, job: &JobContext, state: JobState) {
    if let Err(e) = committer.abort_job(job, state).await {
        warn!("Failed to abort job {}: {e}", job.job_id());
    }
}

async fn run_task(
    format: Arc<dyn OutputFormat>,
    committer: Arc<dyn OutputCommitter>,
    job: Arc<JobContext>,
    task: u32,
    records: Vec<JsonValue>,
    max_attempts: u32,
) -> Result<TaskReport> {
    let mut attempt = 0;
    loop {
        let ctx = job.task_attempt(task, attempt);
        match run_attempt(format.as_ref(), committer.as_ref(), &ctx, &records).await {
            Ok((written, committed)) => {
                return Ok(TaskReport {
                    task,
                    attempt,
                    records: written,
                    committed,
                })
            }
            Err(e) => {
                warn!("Task attempt {} failed: {e}", ctx.attempt_id());
                if let Err(abort_err) = committer.abort_task(&ctx).await {
                    warn!("Failed to abort {}: {abort_err}", ctx.attempt_id());
                }
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
            }
        }
    }
}

async fn run_attempt(
    format: &dyn OutputFormat,
    committer: &dyn OutputCommitter,
    ctx: &TaskAttemptContext,
    records: &[JsonValue],
) -> Result<(u64, bool)> {
    committer.setup_task(ctx).await?;

    let mut writer = format.get_record_writer(ctx).await?;
    for record in records {
        writer.write(record).await?;
    }
    let written = writer.close().await?;

    let committed = committer.needs_task_commit(ctx).await?;
    if committed {
        committer.commit_task(ctx).await?;
    }
    debug!("Task attempt {} wrote {written} records", ctx.attempt_id());
    Ok((written, committed))
}

#[cfg(test)]
mod tests;
