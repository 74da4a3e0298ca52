//! Job and task attempt contexts

use super::types::{JobId, TaskAttemptId};
use crate::config::JobConfiguration;
use crate::error::Result;
use crate::storage::StagingStore;
use std::sync::Arc;

/// Read-only state shared by every task of a job
#[derive(Debug)]
pub struct JobContext {
    job_id: JobId,
    configuration: Arc<JobConfiguration>,
    store: Arc<StagingStore>,
}

impl JobContext {
    /// Create a job context, resolving the staging store from the configured path
    pub fn new(job_id: JobId, configuration: JobConfiguration) -> Result<Arc<Self>> {
        let store = StagingStore::from_url(configuration.staging_path()?)?;
        Ok(Self::with_store(job_id, configuration, store))
    }

    /// Create a job context around an already-built staging store
    pub fn with_store(
        job_id: JobId,
        configuration: JobConfiguration,
        store: StagingStore,
    ) -> Arc<Self> {
        Arc::new(Self {
            job_id,
            configuration: Arc::new(configuration),
            store: Arc::new(store),
        })
    }

    /// Job id
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Shared job configuration
    pub fn configuration(&self) -> &Arc<JobConfiguration> {
        &self.configuration
    }

    /// Staging store for this job's output
    pub fn store(&self) -> &Arc<StagingStore> {
        &self.store
    }

    /// Context for one attempt of one task
    pub fn task_attempt(self: &Arc<Self>, task: u32, attempt: u32) -> TaskAttemptContext {
        TaskAttemptContext {
            attempt_id: TaskAttemptId::new(self.job_id.clone(), task, attempt),
            job: Arc::clone(self),
        }
    }
}

/// One execution attempt of one task
#[derive(Debug, Clone)]
pub struct TaskAttemptContext {
    attempt_id: TaskAttemptId,
    job: Arc<JobContext>,
}

impl TaskAttemptContext {
    /// Attempt id
    pub fn attempt_id(&self) -> &TaskAttemptId {
        &self.attempt_id
    }

    /// Task number within the job
    pub fn task(&self) -> u32 {
        self.attempt_id.task
    }

    /// Owning job
    pub fn job(&self) -> &Arc<JobContext> {
        &self.job
    }

    /// Shared job configuration
    pub fn configuration(&self) -> &JobConfiguration {
        &self.job.configuration
    }

    /// Staging store for this job's output
    pub fn store(&self) -> &Arc<StagingStore> {
        &self.job.store
    }

    /// Directory (relative to the staging root) private to this attempt
    pub fn attempt_dir(&self) -> String {
        format!("_temporary/{}", self.attempt_id)
    }
}
