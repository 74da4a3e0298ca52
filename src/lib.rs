// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # bqstage
//!
//! Output-commit layer for warehouse bulk loads.
//!
//! Records are written to a staging directory in cloud storage by a pluggable
//! delegate output format. Before anything is written, the staging directory
//! must not exist and compression must be off. Once every task committed, the
//! job commit issues one BigQuery load job over the staged files.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bqstage::{
//!     BigQueryLoader, BigQueryLoaderConfig, FileFormat, ForwardingOutputFormat, JobConfiguration,
//!     JobContext, JobId, LocalJobRunner, WarehouseOutputFormat,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bqstage::Result<()> {
//!     let conf = JobConfiguration::builder()
//!         .configure_with_auto_schema(
//!             "my-project:dataset.events",
//!             "gs://my-bucket/staging/events/",
//!             FileFormat::NewlineDelimitedJson,
//!             "json",
//!         )?
//!         .build();
//!     let job = JobContext::new(JobId::generate(), conf)?;
//!
//!     let loader = BigQueryLoader::new(BigQueryLoaderConfig::default())?;
//!     let format = WarehouseOutputFormat::new(ForwardingOutputFormat::new(), Arc::new(loader));
//!
//!     let records = vec![serde_json::json!({"id": 1})];
//!     LocalJobRunner::new(Arc::new(format)).run(&job, vec![records]).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                  WarehouseOutputFormat                      │
//! │  check_output_specs → writer → committer (commit_job=load)  │
//! └────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────┬──────────────┴───────┬───────────────────────┐
//! │  Forwarding  │      Delegates       │        Commit         │
//! ├──────────────┼──────────────────────┼───────────────────────┤
//! │ path exists  │ text / json          │ delegate commit_job   │
//! │ compression  │ parquet              │ one load job          │
//! │ delegate     │ FileOutputCommitter  │ staging cleanup       │
//! └──────────────┴──────────────────────┴───────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Job configuration keys and accessors
pub mod config;

/// Staging directory storage
pub mod storage;

/// Job and task attempt contexts
pub mod job;

/// Output formats, writers and committers
pub mod output;

/// Warehouse load at job commit
pub mod commit;

/// In-process job driver
pub mod runner;

/// Command-line interface
pub mod cli;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use commit::{
    BigQueryLoader, BigQueryLoaderConfig, OutputCommitDescriptor, WarehouseLoadCommitter,
    WarehouseLoader, WarehouseOutputFormat,
};
pub use config::JobConfiguration;
pub use job::{JobContext, JobId, JobState, TaskAttemptContext};
pub use output::{
    DelegateRegistry, FileOutputFormat, ForwardingOutputFormat, OutputCommitter, OutputFormat,
    RecordWriter,
};
pub use runner::LocalJobRunner;
pub use storage::StagingStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
