//! Warehouse load commit trigger
//!
//! Wraps the delegate's committer. Task-level calls pass straight through;
//! `commit_job` first lets the delegate finalize the staged files, then issues
//! a single load request for them.

use super::descriptor::OutputCommitDescriptor;
use super::loader::{LoadOutcome, WarehouseLoader};
use crate::error::{Error, Result};
use crate::job::{JobContext, JobState, TaskAttemptContext};
use crate::output::OutputCommitter;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Committer loading the job's staged files into the warehouse at job commit
pub struct WarehouseLoadCommitter {
    delegate: Arc<dyn OutputCommitter>,
    loader: Arc<dyn WarehouseLoader>,
    load_failed: AtomicBool,
}

impl WarehouseLoadCommitter {
    pub fn new(delegate: Arc<dyn OutputCommitter>, loader: Arc<dyn WarehouseLoader>) -> Self {
        Self {
            delegate,
            loader,
            load_failed: AtomicBool::new(false),
        }
    }

    /// The wrapped delegate committer
    pub fn delegate(&self) -> &Arc<dyn OutputCommitter> {
        &self.delegate
    }

    /// Whether the last load attempt failed
    pub fn load_failed(&self) -> bool {
        self.load_failed.load(Ordering::SeqCst)
    }

    /// Load every visible file in the staging directory
    ///
    /// Returns `None` without contacting the warehouse when there is nothing
    /// to load. Any failure is reported as [`Error::WarehouseLoad`] and leaves
    /// the staged files in place.
    pub async fn load_staged(&self, job: &JobContext) -> Result<Option<LoadOutcome>> {
        let source_uris: Vec<String> = job
            .store()
            .list("")
            .await?
            .into_iter()
            .filter(|object| !object.is_hidden())
            .map(|object| object.uri)
            .collect();

        if source_uris.is_empty() {
            warn!(
                "No staged files under {}, skipping warehouse load",
                job.store().location()
            );
            return Ok(None);
        }

        let descriptor = OutputCommitDescriptor::from_job(job, source_uris)?;
        match self.loader.load(&descriptor).await {
            Ok(outcome) => {
                self.load_failed.store(false, Ordering::SeqCst);
                Ok(Some(outcome))
            }
            Err(e) => {
                self.load_failed.store(true, Ordering::SeqCst);
                warn!(
                    "Load of {} failed, keeping staged files in {}",
                    descriptor.table, descriptor.staging_path
                );
                Err(match e {
                    Error::WarehouseLoad { .. } => e,
                    other => Error::warehouse_load(descriptor.load_job_id, other.to_string()),
                })
            }
        }
    }

    /// Load the staged files, then delete them if the job asks for it
    ///
    /// Used by `commit_job` and to re-run the load over a staging directory
    /// kept by an earlier failed load. Once the load has succeeded nothing
    /// here fails: cleanup problems are logged and the files stay behind.
    pub async fn load_and_clean_up(&self, job: &JobContext) -> Result<Option<LoadOutcome>> {
        let Some(outcome) = self.load_staged(job).await? else {
            return Ok(None);
        };
        info!(
            "Job {} loaded by {} ({} rows)",
            job.job_id(),
            outcome.job_id,
            outcome
                .output_rows
                .map_or_else(|| "unknown".to_string(), |rows| rows.to_string())
        );

        match job.configuration().cleanup_staging() {
            Ok(true) => self.cleanup(job).await,
            Ok(false) => {}
            Err(e) => warn!("Keeping staged files in {}: {e}", job.store().location()),
        }
        Ok(Some(outcome))
    }

    async fn cleanup(&self, job: &JobContext) {
        match job.store().delete_all().await {
            Ok(removed) => info!(
                "Removed {removed} staged files from {}",
                job.store().location()
            ),
            Err(e) => warn!("Failed to clean up {}: {e}", job.store().location()),
        }
    }
}

#[async_trait]
impl OutputCommitter for WarehouseLoadCommitter {
    async fn setup_job(&self, job: &JobContext) -> Result<()> {
        self.delegate.setup_job(job).await
    }

    async fn setup_task(&self, task: &TaskAttemptContext) -> Result<()> {
        self.delegate.setup_task(task).await
    }

    async fn needs_task_commit(&self, task: &TaskAttemptContext) -> Result<bool> {
        self.delegate.needs_task_commit(task).await
    }

    async fn commit_task(&self, task: &TaskAttemptContext) -> Result<()> {
        self.delegate.commit_task(task).await
    }

    async fn abort_task(&self, task: &TaskAttemptContext) -> Result<()> {
        self.delegate.abort_task(task).await
    }

    async fn commit_job(&self, job: &JobContext) -> Result<()> {
        self.delegate.commit_job(job).await?;
        self.load_and_clean_up(job).await?;
        Ok(())
    }

    async fn abort_job(&self, job: &JobContext, state: JobState) -> Result<()> {
        self.delegate.abort_job(job, state).await?;

        if self.load_failed() {
            info!(
                "Job {} aborted after a failed load, staged files kept in {}",
                job.job_id(),
                job.store().location()
            );
            return Ok(());
        }

        if job.configuration().cleanup_staging()? {
            self.cleanup(job).await;
        }
        Ok(())
    }
}
