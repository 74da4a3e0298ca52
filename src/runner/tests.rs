//! Tests for runner module

use super::*;
use crate::config::JobConfiguration;
use crate::job::TaskAttemptContext;
use crate::output::{FileOutputFormat, ForwardingOutputFormat, RecordWriter};
use crate::testing::{memory_job, test_configuration, MockCommitter, MockOutputFormat};
use crate::types::FileFormat;
use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::json;

fn json_configuration() -> JobConfiguration {
    JobConfiguration::builder()
        .configure_with_auto_schema(
            "my-project:dataset.table",
            "gs://test_bucket/test_directory/",
            FileFormat::NewlineDelimitedJson,
            "json",
        )
        .unwrap()
        .build()
}

fn records(n: usize) -> Vec<JsonValue> {
    (0..n).map(|i| json!({"id": i})).collect()
}

/// JSON format whose first attempt of one task fails to open a writer
struct FlakyFormat {
    inner: FileOutputFormat,
    flaky_task: u32,
}

#[async_trait]
impl OutputFormat for FlakyFormat {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn check_output_specs(&self, context: &TaskAttemptContext) -> Result<()> {
        self.inner.check_output_specs(context).await
    }

    async fn get_record_writer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>> {
        let id = context.attempt_id();
        if id.task == self.flaky_task && id.attempt == 0 {
            return Err(Error::output("disk full"));
        }
        self.inner.get_record_writer(context).await
    }

    async fn get_output_committer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Arc<dyn OutputCommitter>> {
        self.inner.get_output_committer(context).await
    }
}

// ============================================================================
// Partitioning
// ============================================================================

#[test]
fn test_partition_records() {
    let partitions = partition_records(records(5), 2);
    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].len(), 3);
    assert_eq!(partitions[1].len(), 2);
}

#[test]
fn test_partition_records_more_tasks_than_records() {
    let partitions = partition_records(records(2), 8);
    assert_eq!(partitions.len(), 2);
    assert!(partition_records(Vec::new(), 4).is_empty());
    assert_eq!(partition_records(records(3), 0).len(), 1);
}

#[test]
fn test_runner_config() {
    assert_eq!(RunnerConfig::default().max_task_attempts, 2);
    assert_eq!(RunnerConfig::new().with_max_task_attempts(0).max_task_attempts, 1);
}

// ============================================================================
// Protocol
// ============================================================================

#[tokio::test]
async fn test_run_drives_protocol_in_order() {
    let committer = Arc::new(MockCommitter::default());
    let delegate = Arc::new(MockOutputFormat::with_committer(committer.clone()));
    let runner = LocalJobRunner::new(delegate.clone());
    let job = memory_job(test_configuration());

    let report = runner.run(&job, vec![records(3)]).await.unwrap();

    assert_eq!(delegate.checks(), 1);
    assert_eq!(
        committer.events(),
        vec![
            "setup_job",
            "setup_task",
            "needs_task_commit",
            "commit_task",
            "commit_job",
        ]
    );
    assert_eq!(report.records_written(), 3);
    assert_eq!(report.retried_attempts(), 0);
}

#[tokio::test]
async fn test_run_stops_when_check_fails() {
    let delegate = Arc::new(MockOutputFormat::failing_check("bad output spec"));
    let runner = LocalJobRunner::new(delegate.clone());
    let job = memory_job(test_configuration());

    let err = runner.run(&job, vec![records(1)]).await.unwrap_err();

    assert_eq!(err.to_string(), "bad output spec");
    assert!(delegate.committer.events().is_empty());
    assert_eq!(delegate.total_calls(), 1);
}

#[tokio::test]
async fn test_run_failed_commit_aborts_job() {
    let committer = Arc::new(MockCommitter::failing());
    let delegate = Arc::new(MockOutputFormat::with_committer(committer.clone()));
    let runner = LocalJobRunner::new(delegate);
    let job = memory_job(test_configuration());

    runner.run(&job, vec![records(1)]).await.unwrap_err();

    let events = committer.events();
    assert_eq!(
        &events[events.len() - 2..],
        &["commit_job".to_string(), "abort_job:Failed".to_string()]
    );
}

// ============================================================================
// With File Output
// ============================================================================

#[tokio::test]
async fn test_run_stages_one_file_per_task() {
    let runner = LocalJobRunner::new(Arc::new(ForwardingOutputFormat::new()));
    let job = memory_job(json_configuration());

    let report = runner
        .run(&job, partition_records(records(10), 3))
        .await
        .unwrap();

    let staged: Vec<String> = job
        .store()
        .list("")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.relative)
        .collect();
    assert_eq!(
        staged,
        vec![
            "_SUCCESS",
            "part-00000.json",
            "part-00001.json",
            "part-00002.json",
        ]
    );
    assert_eq!(report.tasks.len(), 3);
    assert_eq!(report.records_written(), 10);

    let first = job.store().get("part-00000.json").await.unwrap();
    assert_eq!(first.iter().filter(|b| **b == b'\n').count(), 4);
}

#[tokio::test]
async fn test_run_retries_failed_attempt() {
    let format = Arc::new(FlakyFormat {
        inner: FileOutputFormat::json(),
        flaky_task: 1,
    });
    let runner = LocalJobRunner::new(format);
    let job = memory_job(json_configuration());

    let report = runner
        .run(&job, partition_records(records(4), 2))
        .await
        .unwrap();

    assert_eq!(report.tasks[1].attempt, 1);
    assert_eq!(report.retried_attempts(), 1);
    assert!(job.store().list("_temporary").await.unwrap().is_empty());
    assert_eq!(job.store().list("").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_run_exhausted_attempts_fail_job() {
    let runner = LocalJobRunner::new(Arc::new(ForwardingOutputFormat::new()));
    let job = memory_job(json_configuration());

    let err = runner
        .run(&job, vec![vec![json!("not an object")]])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Output { .. }));
    assert!(job.store().list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_validate_rejects_existing_staging() {
    let runner = LocalJobRunner::new(Arc::new(ForwardingOutputFormat::new()));
    let job = memory_job(json_configuration());
    job.store()
        .put("leftover.json", Bytes::from_static(b"{}\n"))
        .await
        .unwrap();

    let err = runner.validate(&job).await.unwrap_err();

    assert!(matches!(err, Error::OutputPathExists { .. }));
}
