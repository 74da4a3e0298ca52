//! Warehouse load collaborator
//!
//! [`WarehouseLoader`] is the single outbound call made at job commit.
//! [`BigQueryLoader`] implements it over the BigQuery REST API: it inserts a
//! load job under a deterministic id, treats "already exists" as the same
//! load submitted earlier, and polls until the job is done.

use super::descriptor::OutputCommitDescriptor;
use crate::config::keys;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default BigQuery REST endpoint
pub const DEFAULT_BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Result of a finished load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Load job id
    pub job_id: String,
    /// Rows loaded, when reported
    pub output_rows: Option<u64>,
    /// Whether an earlier submission of the same job was reused
    pub reused_existing: bool,
}

/// Promotes staged files into the warehouse
#[async_trait]
pub trait WarehouseLoader: Send + Sync {
    /// Run one load and wait for it to finish
    ///
    /// Implementations must be safe to call again with the same descriptor.
    async fn load(&self, descriptor: &OutputCommitDescriptor) -> Result<LoadOutcome>;
}

// ============================================================================
// BigQuery Loader Config
// ============================================================================

/// Configuration for the BigQuery loader
#[derive(Debug, Clone)]
pub struct BigQueryLoaderConfig {
    /// REST base URL
    pub base_url: String,
    /// OAuth2 bearer token
    pub access_token: Option<String>,
    /// Delay between job status polls
    pub poll_interval: Duration,
    /// Retries for transient HTTP failures
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry
    pub initial_backoff: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for BigQueryLoaderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BIGQUERY_URL.to_string(),
            access_token: None,
            poll_interval: Duration::from_secs(1),
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("bqstage/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl BigQueryLoaderConfig {
    /// Create a new config builder
    pub fn builder() -> BigQueryLoaderConfigBuilder {
        BigQueryLoaderConfigBuilder::default()
    }
}

/// Builder for the BigQuery loader config
#[derive(Default)]
pub struct BigQueryLoaderConfigBuilder {
    config: BigQueryLoaderConfig,
}

impl BigQueryLoaderConfigBuilder {
    /// Set the REST base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the bearer token
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set retry behaviour for transient failures
    pub fn retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.config.max_retries = max_retries;
        self.config.initial_backoff = initial_backoff;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the config
    pub fn build(self) -> BigQueryLoaderConfig {
        self.config
    }
}

// ============================================================================
// BigQuery Loader
// ============================================================================

/// BigQuery REST load client
#[derive(Debug, Clone)]
pub struct BigQueryLoader {
    client: Client,
    config: BigQueryLoaderConfig,
}

impl BigQueryLoader {
    /// Create a loader
    pub fn new(config: BigQueryLoaderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, config })
    }

    /// Loader configuration
    pub fn config(&self) -> &BigQueryLoaderConfig {
        &self.config
    }

    fn jobs_url(&self, project_id: &str) -> String {
        format!(
            "{}/projects/{project_id}/jobs",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn get_job(&self, descriptor: &OutputCommitDescriptor) -> Result<JsonValue> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            self.jobs_url(&descriptor.project_id),
            descriptor.load_job_id
        ))?;
        if let Some(location) = &descriptor.location {
            url.query_pairs_mut().append_pair("location", location);
        }
        self.execute(Method::GET, url.as_str(), None).await
    }

    /// Send a request, retrying transient failures
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&JsonValue>,
    ) -> Result<JsonValue> {
        let mut attempt = 0;
        loop {
            match self.execute_once(method.clone(), url, body).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.initial_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!("{method} {url} failed ({e}), retry {attempt} in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&JsonValue>,
    ) -> Result<JsonValue> {
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }
        Ok(response.json().await?)
    }
}

/// `status.state` of a job resource
fn job_state(job: &JsonValue) -> &str {
    job["status"]["state"].as_str().unwrap_or("PENDING")
}

#[async_trait]
impl WarehouseLoader for BigQueryLoader {
    async fn load(&self, descriptor: &OutputCommitDescriptor) -> Result<LoadOutcome> {
        let job_id = descriptor.load_job_id.clone();
        let request = descriptor.to_job_request();

        info!(
            "Submitting load job {job_id}: {} files into {}",
            descriptor.source_uris.len(),
            descriptor.table
        );

        let (mut job, reused_existing) = match self
            .execute(Method::POST, &self.jobs_url(&descriptor.project_id), Some(&request))
            .await
        {
            Ok(job) => (job, false),
            Err(Error::HttpStatus { status, .. }) if status == StatusCode::CONFLICT.as_u16() => {
                info!("Load job {job_id} already exists, resuming it");
                (self.get_job(descriptor).await?, true)
            }
            Err(e) => return Err(Error::warehouse_load(job_id, e.to_string())),
        };

        while job_state(&job) != "DONE" {
            debug!("Load job {job_id} is {}", job_state(&job));
            tokio::time::sleep(self.config.poll_interval).await;
            job = self
                .get_job(descriptor)
                .await
                .map_err(|e| Error::warehouse_load(&job_id, e.to_string()))?;
        }

        if let Some(error) = job["status"].get("errorResult") {
            let mut message = error["message"]
                .as_str()
                .map_or_else(|| error.to_string(), str::to_string);
            if reused_existing {
                // The id is taken by a finished job; resubmitting it only fetches this result again
                message.push_str(&format!(
                    " (load job {job_id} already ran and failed; retry with a new load attempt via {})",
                    keys::LOAD_ATTEMPT
                ));
            }
            return Err(Error::warehouse_load(job_id, message));
        }

        let output_rows = job["statistics"]["load"]["outputRows"]
            .as_str()
            .and_then(|rows| rows.parse().ok());

        info!("Load job {job_id} finished ({output_rows:?} rows)");
        Ok(LoadOutcome {
            job_id,
            output_rows,
            reused_existing,
        })
    }
}
