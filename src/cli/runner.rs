//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputStyle};
use crate::commit::{
    BigQueryLoader, BigQueryLoaderConfig, OutputCommitDescriptor, WarehouseLoadCommitter,
    WarehouseOutputFormat,
};
use crate::config::JobConfiguration;
use crate::error::{Error, Result, ResultExt};
use crate::job::{JobContext, JobId};
use crate::output::{DelegateRegistry, ForwardingOutputFormat, OutputFormat};
use crate::runner::{partition_records, JobReport, LocalJobRunner, RunnerConfig};
use crate::types::JsonValue;
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Environment variable holding the OAuth2 access token for BigQuery
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Validate => self.validate().await,
            Commands::Run {
                input,
                tasks,
                max_attempts,
                job_id,
                no_load,
                bigquery_url,
            } => {
                self.run_job(
                    input.as_deref(),
                    *tasks,
                    *max_attempts,
                    job_id.as_deref(),
                    *no_load,
                    bigquery_url.as_deref(),
                )
                .await
            }
            Commands::Describe { job_id } => self.describe(job_id).await,
            Commands::Load {
                job_id,
                attempt,
                bigquery_url,
            } => self.load(job_id, *attempt, bigquery_url.as_deref()).await,
            Commands::Formats => self.formats(),
        }
    }

    /// Load the job configuration file and apply `--set` overrides
    fn load_configuration(&self) -> Result<JobConfiguration> {
        let base = match &self.cli.config {
            Some(path) => JobConfiguration::from_file(path)?,
            None => JobConfiguration::default(),
        };
        apply_overrides(base, &self.cli.overrides)
    }

    fn build_job(&self, job_id: Option<&str>) -> Result<Arc<JobContext>> {
        let conf = self.load_configuration()?;
        let job_id = job_id.map_or_else(JobId::generate, JobId::new);
        JobContext::new(job_id, conf)
    }

    fn build_loader(bigquery_url: Option<&str>) -> Result<BigQueryLoader> {
        let mut builder = BigQueryLoaderConfig::builder();
        if let Some(url) = bigquery_url {
            builder = builder.base_url(url);
        }
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            builder = builder.access_token(token);
        }
        BigQueryLoader::new(builder.build())
    }

    /// Check output specs
    async fn validate(&self) -> Result<()> {
        let job = self.build_job(None)?;
        let runner = LocalJobRunner::new(Arc::new(ForwardingOutputFormat::new()));
        runner.validate(&job).await?;

        self.output_message(&json!({
            "type": "VALIDATION",
            "valid": true,
            "table": job.configuration().table_reference()?.to_string(),
            "path": job.configuration().staging_path()?,
        }));
        Ok(())
    }

    /// Run a job over newline-delimited JSON input
    async fn run_job(
        &self,
        input: Option<&Path>,
        tasks: usize,
        max_attempts: u32,
        job_id: Option<&str>,
        no_load: bool,
        bigquery_url: Option<&str>,
    ) -> Result<()> {
        let job = self.build_job(job_id)?;
        let records = read_records(input).await?;
        info!("Read {} records", records.len());

        let forwarding = ForwardingOutputFormat::new();
        let format: Arc<dyn OutputFormat> = if no_load {
            Arc::new(forwarding)
        } else {
            let loader = Self::build_loader(bigquery_url)?;
            Arc::new(WarehouseOutputFormat::new(forwarding, Arc::new(loader)))
        };

        let runner = LocalJobRunner::new(format)
            .with_config(RunnerConfig::new().with_max_task_attempts(max_attempts));
        let report = runner
            .run(&job, partition_records(records, tasks))
            .await?;

        self.output_report(&report, !no_load);
        Ok(())
    }

    /// Print the load job request for the files currently staged
    async fn describe(&self, job_id: &str) -> Result<()> {
        let job = self.build_job(Some(job_id))?;
        let source_uris = job
            .store()
            .list("")
            .await?
            .into_iter()
            .filter(|object| !object.is_hidden())
            .map(|object| object.uri)
            .collect();

        let descriptor = OutputCommitDescriptor::from_job(&job, source_uris)?;
        self.output_message(&json!({
            "type": "LOAD_JOB",
            "request": descriptor.to_job_request(),
        }));
        Ok(())
    }

    /// Load files kept in staging by an earlier failed load
    async fn load(
        &self,
        job_id: &str,
        attempt: Option<u32>,
        bigquery_url: Option<&str>,
    ) -> Result<()> {
        let mut conf = self.load_configuration()?;
        if let Some(attempt) = attempt {
            conf = conf.to_builder().load_attempt(attempt).build();
        }
        conf.validate()?;
        let job = JobContext::new(JobId::new(job_id), conf)?;

        let forwarding = ForwardingOutputFormat::new();
        let delegate = forwarding.create_committer(&job.task_attempt(0, 0)).await?;
        let loader = Self::build_loader(bigquery_url)?;
        let committer = WarehouseLoadCommitter::new(delegate, Arc::new(loader));

        let outcome = committer.load_and_clean_up(&job).await?;
        self.output_message(&json!({
            "type": "LOAD_RESULT",
            "job_id": job.job_id().to_string(),
            "loaded": outcome.is_some(),
            "load_job_id": outcome.as_ref().map(|o| o.job_id.clone()),
            "output_rows": outcome.as_ref().and_then(|o| o.output_rows),
            "reused_existing": outcome.as_ref().is_some_and(|o| o.reused_existing),
        }));
        Ok(())
    }

    /// List registered delegate formats
    fn formats(&self) -> Result<()> {
        let registry = DelegateRegistry::builtin();
        let names: Vec<&str> = registry.names().collect();
        self.output_message(&json!({
            "type": "FORMATS",
            "formats": names,
        }));
        Ok(())
    }

    fn output_report(&self, report: &JobReport, loaded: bool) {
        let tasks: Vec<JsonValue> = report
            .tasks
            .iter()
            .map(|task| {
                json!({
                    "task": task.task,
                    "attempt": task.attempt,
                    "records": task.records,
                    "committed": task.committed,
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "JOB_REPORT",
            "job_id": report.job_id.to_string(),
            "records": report.records_written(),
            "loaded": loaded,
            "duration_ms": report.duration_ms,
            "tasks": tasks,
        }));
    }

    fn output_message(&self, msg: &JsonValue) {
        match self.cli.format {
            OutputStyle::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputStyle::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Apply `key=value` overrides on top of a configuration
pub fn apply_overrides(base: JobConfiguration, overrides: &[String]) -> Result<JobConfiguration> {
    let mut builder = base.to_builder();
    for entry in overrides {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            Error::invalid_value("--set", format!("expected KEY=VALUE, got '{entry}'"))
        })?;
        builder = builder.set(key.trim(), value.trim());
    }
    Ok(builder.build())
}

/// Parse newline-delimited JSON, skipping blank lines
pub fn parse_records(contents: &str) -> Result<Vec<JsonValue>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid JSON on input line {}", n + 1))
        })
        .collect()
}

async fn read_records(input: Option<&Path>) -> Result<Vec<JsonValue>> {
    let contents = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    parse_records(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keys;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_overrides() {
        let conf = apply_overrides(
            JobConfiguration::default(),
            &[
                "bq.output.table = dataset.table".to_string(),
                "output.compress=false".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(conf.get(keys::OUTPUT_TABLE), Some("dataset.table"));
        assert_eq!(conf.get(keys::COMPRESS_OUTPUT), Some("false"));
    }

    #[test]
    fn test_apply_overrides_rejects_missing_separator() {
        let err = apply_overrides(JobConfiguration::default(), &["oops".to_string()]).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_parse_load_command() {
        use clap::Parser;

        let cli = Cli::try_parse_from([
            "bqstage",
            "load",
            "--job-id",
            "job_0001",
            "--attempt",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Load {
                job_id,
                attempt,
                bigquery_url,
            } => {
                assert_eq!(job_id, "job_0001");
                assert_eq!(attempt, Some(2));
                assert_eq!(bigquery_url, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_records() {
        let records = parse_records("{\"a\":1}\n\n{\"a\":2}\n").unwrap();
        assert_eq!(records, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn test_parse_records_reports_line() {
        let err = parse_records("{\"a\":1}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
