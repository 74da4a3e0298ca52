//! Integration tests using a mock BigQuery server
//!
//! Tests the full end-to-end flow: records → staged files → task/job commit → load job

use bqstage::cli::{Cli, Runner};
use bqstage::commit::{BigQueryLoader, BigQueryLoaderConfig, WarehouseOutputFormat};
use bqstage::config::{keys, JobConfiguration};
use bqstage::job::{JobContext, JobId};
use bqstage::output::ForwardingOutputFormat;
use bqstage::runner::{partition_records, LocalJobRunner};
use bqstage::{Error, FileFormat};
use clap::Parser;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn configuration(staging: &Path) -> JobConfiguration {
    JobConfiguration::builder()
        .configure_with_auto_schema(
            "my-project:dataset.events",
            &staging.to_string_lossy(),
            FileFormat::NewlineDelimitedJson,
            "json",
        )
        .unwrap()
        .build()
}

fn warehouse_runner(server: &MockServer) -> LocalJobRunner {
    let config = BigQueryLoaderConfig::builder()
        .base_url(server.uri())
        .poll_interval(Duration::from_millis(10))
        .build();
    let loader = BigQueryLoader::new(config).unwrap();
    let format = WarehouseOutputFormat::new(ForwardingOutputFormat::new(), Arc::new(loader));
    LocalJobRunner::new(Arc::new(format))
}

fn events(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"id": i, "name": format!("event-{i}")}))
        .collect()
}

fn staged_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

async fn mount_load_job(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/projects/my-project/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_job_loads_staged_files_and_cleans_up() {
    let server = MockServer::start().await;
    mount_load_job(
        &server,
        json!({"status": {"state": "DONE"}, "statistics": {"load": {"outputRows": "6"}}}),
    )
    .await;

    let temp = tempfile::tempdir().unwrap();
    let staging = temp.path().join("staging");
    let job = JobContext::new(JobId::new("job_it_0001"), configuration(&staging)).unwrap();

    let report = warehouse_runner(&server)
        .run(&job, partition_records(events(6), 2))
        .await
        .unwrap();

    assert_eq!(report.records_written(), 6);
    assert!(!staging.exists());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let load = &body["configuration"]["load"];
    assert_eq!(
        body["jobReference"]["jobId"],
        "bqstage_job_it_0001_my-project_dataset_events"
    );
    assert_eq!(load["sourceFormat"], "NEWLINE_DELIMITED_JSON");
    assert_eq!(load["autodetect"], true);
    let uris: Vec<&str> = load["sourceUris"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u.as_str().unwrap())
        .collect();
    assert_eq!(uris.len(), 2);
    assert!(uris[0].ends_with("/staging/part-00000.json"));
    assert!(uris[1].ends_with("/staging/part-00001.json"));
}

#[tokio::test]
async fn test_second_job_into_same_path_is_rejected() {
    let server = MockServer::start().await;
    mount_load_job(&server, json!({"status": {"state": "DONE"}})).await;

    let temp = tempfile::tempdir().unwrap();
    let staging = temp.path().join("staging");
    let conf = configuration(&staging)
        .to_builder()
        .set(keys::OUTPUT_CLEANUP_STAGING, "false")
        .build();
    let runner = warehouse_runner(&server);

    let first = JobContext::new(JobId::new("job_it_0002"), conf.clone()).unwrap();
    runner.run(&first, vec![events(3)]).await.unwrap();
    assert_eq!(staged_files(&staging), vec!["_SUCCESS", "part-00000.json"]);

    let second = JobContext::new(JobId::new("job_it_0003"), conf).unwrap();
    let err = runner.run(&second, vec![events(3)]).await.unwrap_err();

    assert!(matches!(err, Error::OutputPathExists { .. }));
    assert!(err.is_fatal_to_job_start());
    assert!(err.to_string().contains(&format!(
        "The output path '{}' already exists.",
        staging.to_string_lossy()
    )));
}

#[tokio::test]
async fn test_failed_load_keeps_staged_files() {
    let server = MockServer::start().await;
    mount_load_job(
        &server,
        json!({
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalid", "message": "Schema mismatch"},
            },
        }),
    )
    .await;

    let temp = tempfile::tempdir().unwrap();
    let staging = temp.path().join("staging");
    let job = JobContext::new(JobId::new("job_it_0004"), configuration(&staging)).unwrap();

    let err = warehouse_runner(&server)
        .run(&job, vec![events(2)])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::WarehouseLoad { .. }));
    assert!(err.to_string().contains("Schema mismatch"));
    assert_eq!(staged_files(&staging), vec!["_SUCCESS", "part-00000.json"]);
}

#[tokio::test]
async fn test_load_command_retries_kept_staging_with_new_attempt() {
    let server = MockServer::start().await;
    mount_load_job(
        &server,
        json!({"status": {"state": "DONE", "errorResult": {"message": "Quota exceeded"}}}),
    )
    .await;

    let temp = tempfile::tempdir().unwrap();
    let staging = temp.path().join("staging");
    let job = JobContext::new(JobId::new("job_it_0007"), configuration(&staging)).unwrap();
    assert!(warehouse_runner(&server)
        .run(&job, vec![events(2)])
        .await
        .is_err());
    assert_eq!(staged_files(&staging), vec!["_SUCCESS", "part-00000.json"]);

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/projects/my-project/jobs"))
        .and(body_partial_json(json!({
            "jobReference": {"jobId": "bqstage_job_it_0007_my-project_dataset_events_a1"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"state": "DONE"}})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let staging_arg = format!("bq.output.path={}", staging.to_string_lossy());
    let cli = Cli::try_parse_from([
        "bqstage",
        "--set",
        "bq.output.table=my-project:dataset.events",
        "--set",
        staging_arg.as_str(),
        "--set",
        "bq.output.file.format=NEWLINE_DELIMITED_JSON",
        "--set",
        "bq.output.format.class=json",
        "load",
        "--job-id",
        "job_it_0007",
        "--attempt",
        "1",
        "--bigquery-url",
        uri.as_str(),
    ])
    .unwrap();

    Runner::new(cli).run().await.unwrap();

    assert!(!staging.exists());
}

#[tokio::test]
async fn test_invalid_configuration_rejected_before_any_write() {
    let server = MockServer::start().await;

    let temp = tempfile::tempdir().unwrap();
    let staging = temp.path().join("staging");
    let conf = configuration(&staging)
        .to_builder()
        .set(keys::OUTPUT_CLEANUP_STAGING, "maybe")
        .build();
    let job = JobContext::new(JobId::new("job_it_0008"), conf).unwrap();

    let err = warehouse_runner(&server)
        .run(&job, vec![events(1)])
        .await
        .unwrap_err();

    assert!(err.is_config_error());
    assert!(!staging.exists());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_compressed_output_rejected_before_any_write() {
    let server = MockServer::start().await;

    let temp = tempfile::tempdir().unwrap();
    let staging = temp.path().join("staging");
    let conf = configuration(&staging)
        .to_builder()
        .compress_output(true)
        .build();
    let job = JobContext::new(JobId::new("job_it_0005"), conf).unwrap();

    let err = warehouse_runner(&server)
        .run(&job, vec![events(1)])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CompressionUnsupported));
    assert!(!staging.exists());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_parquet_job_stages_parquet_files() {
    let temp = tempfile::tempdir().unwrap();
    let staging = temp.path().join("staging");
    let conf = JobConfiguration::builder()
        .configure_with_auto_schema(
            "my-project:dataset.events",
            &staging.to_string_lossy(),
            FileFormat::Parquet,
            "parquet",
        )
        .unwrap()
        .build();
    let job = JobContext::new(JobId::new("job_it_0006"), conf).unwrap();
    let runner = LocalJobRunner::new(Arc::new(ForwardingOutputFormat::new()));

    runner.run(&job, vec![events(5)]).await.unwrap();

    assert_eq!(
        staged_files(&staging),
        vec!["_SUCCESS", "part-00000.parquet"]
    );
}
