//! Warehouse output format
//!
//! The format a job is submitted with: pre-flight checks and writers come from
//! [`ForwardingOutputFormat`], and its committer is wrapped so that the job
//! commit ends with a warehouse load.

use super::committer::WarehouseLoadCommitter;
use super::loader::WarehouseLoader;
use crate::error::{Error, Result};
use crate::job::TaskAttemptContext;
use crate::output::{ForwardingOutputFormat, OutputCommitter, OutputFormat, RecordWriter};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

/// Forwarding format whose job commit triggers a warehouse load
pub struct WarehouseOutputFormat {
    forwarding: ForwardingOutputFormat,
    loader: Arc<dyn WarehouseLoader>,
    committer: Mutex<Arc<OnceCell<Arc<WarehouseLoadCommitter>>>>,
}

impl WarehouseOutputFormat {
    pub fn new(forwarding: ForwardingOutputFormat, loader: Arc<dyn WarehouseLoader>) -> Self {
        Self {
            forwarding,
            loader,
            committer: Mutex::default(),
        }
    }

    /// The wrapped forwarding format
    pub fn forwarding(&self) -> &ForwardingOutputFormat {
        &self.forwarding
    }

    /// Inject or clear the forwarding delegate, dropping the load committer built over the old one
    pub fn set_delegate(&self, delegate: Option<Arc<dyn OutputFormat>>) {
        self.forwarding.set_delegate(delegate);
        *self.committer.lock().unwrap_or_else(PoisonError::into_inner) = Arc::default();
    }

    /// The load committer, created on first use and shared afterwards
    ///
    /// Concurrent first calls share one committer, so a failed load is seen
    /// by every caller's `abort_job`.
    pub async fn load_committer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Arc<WarehouseLoadCommitter>> {
        let cell = self.committer.lock().unwrap_or_else(PoisonError::into_inner).clone();
        cell.get_or_try_init(|| async {
            let delegate = self.forwarding.create_committer(context).await?;
            debug!("Created warehouse load committer for job {}", context.job().job_id());
            Ok::<_, Error>(Arc::new(WarehouseLoadCommitter::new(
                delegate,
                Arc::clone(&self.loader),
            )))
        })
        .await
        .cloned()
    }
}

#[async_trait]
impl OutputFormat for WarehouseOutputFormat {
    fn name(&self) -> &str {
        "bigquery"
    }

    async fn check_output_specs(&self, context: &TaskAttemptContext) -> Result<()> {
        self.forwarding.check_output_specs(context).await
    }

    async fn get_record_writer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>> {
        self.forwarding.get_record_writer(context).await
    }

    async fn get_output_committer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Arc<dyn OutputCommitter>> {
        let committer: Arc<dyn OutputCommitter> = self.load_committer(context).await?;
        Ok(committer)
    }
}
