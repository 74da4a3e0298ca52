//! File output committer
//!
//! Two-level commit over the staging directory:
//!
//! ```text
//! staging/
//! ├── _temporary/<attempt>/part-NNNNN.<ext>   # attempt output, private
//! ├── part-NNNNN.<ext>                        # committed task output
//! └── _SUCCESS                                # written by commit_job
//! ```

use super::traits::OutputCommitter;
use crate::error::Result;
use crate::job::{JobContext, JobState, TaskAttemptContext};
use crate::storage::StagingStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

/// Directory holding uncommitted attempt output
pub const TEMPORARY_DIR: &str = "_temporary";

/// Marker written when the job commits
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Committer promoting attempt files into the staging root
#[derive(Debug)]
pub struct FileOutputCommitter {
    store: Arc<StagingStore>,
}

impl FileOutputCommitter {
    /// Create a committer over a staging store
    pub fn new(store: Arc<StagingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OutputCommitter for FileOutputCommitter {
    async fn setup_job(&self, job: &JobContext) -> Result<()> {
        debug!("Setting up job {} in {}", job.job_id(), self.store.location());
        Ok(())
    }

    async fn setup_task(&self, task: &TaskAttemptContext) -> Result<()> {
        debug!("Setting up task attempt {}", task.attempt_id());
        Ok(())
    }

    async fn needs_task_commit(&self, task: &TaskAttemptContext) -> Result<bool> {
        Ok(!self.store.list(&task.attempt_dir()).await?.is_empty())
    }

    async fn commit_task(&self, task: &TaskAttemptContext) -> Result<()> {
        let attempt_dir = task.attempt_dir();
        let files = self.store.list(&attempt_dir).await?;

        for file in &files {
            let target = file
                .relative
                .strip_prefix(&format!("{attempt_dir}/"))
                .unwrap_or(&file.relative)
                .to_string();
            self.store.rename(&file.relative, &target).await?;
        }

        info!(
            "Committed task attempt {} ({} files)",
            task.attempt_id(),
            files.len()
        );
        Ok(())
    }

    async fn abort_task(&self, task: &TaskAttemptContext) -> Result<()> {
        let removed = self.store.delete_prefix(&task.attempt_dir()).await?;
        info!(
            "Aborted task attempt {} ({removed} files discarded)",
            task.attempt_id()
        );
        Ok(())
    }

    async fn commit_job(&self, job: &JobContext) -> Result<()> {
        self.store.delete_prefix(TEMPORARY_DIR).await?;
        self.store.put(SUCCESS_MARKER, Bytes::new()).await?;
        info!("Committed job {} to {}", job.job_id(), self.store.location());
        Ok(())
    }

    async fn abort_job(&self, job: &JobContext, state: JobState) -> Result<()> {
        self.store.delete_prefix(TEMPORARY_DIR).await?;
        info!("Aborted job {} ({state:?})", job.job_id());
        Ok(())
    }
}
