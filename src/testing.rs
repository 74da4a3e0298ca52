//! Test doubles shared by unit tests

use crate::config::JobConfiguration;
use crate::error::{Error, Result};
use crate::job::{JobContext, JobId, JobState, TaskAttemptContext};
use crate::output::{OutputCommitter, OutputFormat, RecordWriter};
use crate::storage::StagingStore;
use crate::types::{FileFormat, JsonValue};
use async_trait::async_trait;
use object_store::memory::InMemory;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const TEST_QUALIFIED_TABLE: &str = "domain:project:dataset.table";
pub(crate) const TEST_OUTPUT_PATH: &str = "gs://test_bucket/test_directory/";

/// Configuration with an auto-detected schema and the `text` delegate
pub(crate) fn test_configuration() -> JobConfiguration {
    JobConfiguration::builder()
        .configure_with_auto_schema(
            TEST_QUALIFIED_TABLE,
            TEST_OUTPUT_PATH,
            FileFormat::NewlineDelimitedJson,
            "text",
        )
        .unwrap()
        .build()
}

/// Job whose staging directory lives in an in-memory store
pub(crate) fn memory_job(conf: JobConfiguration) -> Arc<JobContext> {
    let path = conf.staging_path().unwrap().to_string();
    let store = StagingStore::with_store(&path, Arc::new(InMemory::new())).unwrap();
    JobContext::with_store(JobId::new("job_test_0001"), conf, store)
}

/// Address of a boxed writer, for identity assertions
pub(crate) fn writer_addr(writer: &dyn RecordWriter) -> usize {
    std::ptr::addr_of!(*writer).cast::<()>() as usize
}

// ============================================================================
// Committer
// ============================================================================

/// Committer recording every call
#[derive(Default)]
pub(crate) struct MockCommitter {
    pub events: Mutex<Vec<String>>,
    pub fail_commit_job: bool,
}

impl MockCommitter {
    pub fn failing() -> Self {
        Self {
            fail_commit_job: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

#[async_trait]
impl OutputCommitter for MockCommitter {
    async fn setup_job(&self, _job: &JobContext) -> Result<()> {
        self.record("setup_job");
        Ok(())
    }

    async fn setup_task(&self, _task: &TaskAttemptContext) -> Result<()> {
        self.record("setup_task");
        Ok(())
    }

    async fn needs_task_commit(&self, _task: &TaskAttemptContext) -> Result<bool> {
        self.record("needs_task_commit");
        Ok(true)
    }

    async fn commit_task(&self, _task: &TaskAttemptContext) -> Result<()> {
        self.record("commit_task");
        Ok(())
    }

    async fn abort_task(&self, _task: &TaskAttemptContext) -> Result<()> {
        self.record("abort_task");
        Ok(())
    }

    async fn commit_job(&self, _job: &JobContext) -> Result<()> {
        self.record("commit_job");
        if self.fail_commit_job {
            return Err(Error::commit("delegate commit failed"));
        }
        Ok(())
    }

    async fn abort_job(&self, _job: &JobContext, state: JobState) -> Result<()> {
        self.record(format!("abort_job:{state:?}"));
        Ok(())
    }
}

// ============================================================================
// Output Format
// ============================================================================

/// Writer that only counts records
pub(crate) struct CountingWriter {
    rows: u64,
}

#[async_trait]
impl RecordWriter for CountingWriter {
    async fn write(&mut self, _record: &JsonValue) -> Result<()> {
        self.rows += 1;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<u64> {
        Ok(self.rows)
    }
}

/// Output format counting calls and handing out a fixed committer
pub(crate) struct MockOutputFormat {
    pub check_calls: AtomicUsize,
    pub writer_calls: AtomicUsize,
    pub committer_calls: AtomicUsize,
    pub committer: Arc<MockCommitter>,
    pub last_writer: Mutex<Option<usize>>,
    pub check_error: Option<String>,
}

impl MockOutputFormat {
    pub fn new() -> Self {
        Self::with_committer(Arc::new(MockCommitter::default()))
    }

    pub fn with_committer(committer: Arc<MockCommitter>) -> Self {
        Self {
            check_calls: AtomicUsize::new(0),
            writer_calls: AtomicUsize::new(0),
            committer_calls: AtomicUsize::new(0),
            committer,
            last_writer: Mutex::new(None),
            check_error: None,
        }
    }

    pub fn failing_check(message: &str) -> Self {
        Self {
            check_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn checks(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.checks()
            + self.writer_calls.load(Ordering::SeqCst)
            + self.committer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputFormat for MockOutputFormat {
    fn name(&self) -> &str {
        "mock"
    }

    async fn check_output_specs(&self, _context: &TaskAttemptContext) -> Result<()> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        match &self.check_error {
            Some(message) => Err(Error::Other(message.clone())),
            None => Ok(()),
        }
    }

    async fn get_record_writer(
        &self,
        _context: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>> {
        self.writer_calls.fetch_add(1, Ordering::SeqCst);
        let writer: Box<dyn RecordWriter> = Box::new(CountingWriter { rows: 0 });
        *self.last_writer.lock().unwrap() = Some(writer_addr(writer.as_ref()));
        Ok(writer)
    }

    async fn get_output_committer(
        &self,
        _context: &TaskAttemptContext,
    ) -> Result<Arc<dyn OutputCommitter>> {
        self.committer_calls.fetch_add(1, Ordering::SeqCst);
        // Suspend once so concurrent callers interleave
        tokio::task::yield_now().await;
        Ok(self.committer.clone())
    }
}
