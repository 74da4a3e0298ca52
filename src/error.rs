//! Error types for bqstage
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//! Errors raised by a delegate output format travel through unchanged.

use thiserror::Error;

/// The main error type for bqstage
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Unknown output format class '{name}'")]
    UnknownOutputFormat { name: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Pre-flight Errors
    // ============================================================================
    #[error("The output path '{path}' already exists.")]
    OutputPathExists { path: String },

    #[error("Compression isn't supported for this OutputFormat.")]
    CompressionUnsupported,

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    // ============================================================================
    // Output Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("Commit error: {message}")]
    Commit { message: String },

    // ============================================================================
    // Warehouse Errors
    // ============================================================================
    #[error("Warehouse load job '{job_id}' failed: {message}")]
    WarehouseLoad { job_id: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an output-path-exists error
    pub fn output_path_exists(path: impl Into<String>) -> Self {
        Self::OutputPathExists { path: path.into() }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Create a commit error
    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
        }
    }

    /// Create a warehouse load error
    pub fn warehouse_load(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WarehouseLoad {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Whether this error comes from configuration resolution
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::UnknownOutputFormat { .. }
                | Error::YamlParse(_)
        )
    }

    /// Whether this error must stop a job before any task writes
    ///
    /// Retrying without changing the environment fails identically.
    pub fn is_fatal_to_job_start(&self) -> bool {
        self.is_config_error()
            || matches!(
                self,
                Error::OutputPathExists { .. } | Error::CompressionUnsupported
            )
    }

    /// Check if this error is retryable
    ///
    /// Only used by the warehouse REST client for transient transport failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for bqstage
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("bq.output.table");
        assert_eq!(
            err.to_string(),
            "Missing required config field: bq.output.table"
        );

        let err = Error::output_path_exists("gs://bucket/dir/");
        assert_eq!(
            err.to_string(),
            "The output path 'gs://bucket/dir/' already exists."
        );

        assert_eq!(
            Error::CompressionUnsupported.to_string(),
            "Compression isn't supported for this OutputFormat."
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::missing_field("x").is_config_error());
        assert!(Error::UnknownOutputFormat { name: "x".into() }.is_config_error());
        assert!(!Error::CompressionUnsupported.is_config_error());

        assert!(Error::CompressionUnsupported.is_fatal_to_job_start());
        assert!(Error::output_path_exists("p").is_fatal_to_job_start());
        assert!(!Error::warehouse_load("job", "boom").is_fatal_to_job_start());
        assert!(!Error::storage("flaky").is_fatal_to_job_start());
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::http_status(429, "").is_retryable());
        assert!(Error::http_status(503, "").is_retryable());
        assert!(!Error::http_status(400, "").is_retryable());
        assert!(!Error::http_status(409, "").is_retryable());
        assert!(!Error::warehouse_load("job", "failed").is_retryable());
        assert!(!Error::config("test").is_retryable());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
