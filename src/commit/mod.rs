//! Commit module
//!
//! Turns a committed staging directory into a warehouse table.
//!
//! # Overview
//!
//! - `OutputCommitDescriptor` - Table, files, format and schema of one load
//! - `WarehouseLoader` / `BigQueryLoader` - Submits the load and waits for it
//! - `WarehouseLoadCommitter` - Delegate commit first, then exactly one load
//! - `WarehouseOutputFormat` - Forwarding format wired to the load committer

mod committer;
mod descriptor;
mod format;
mod loader;

pub use committer::WarehouseLoadCommitter;
pub use descriptor::{load_job_id, OutputCommitDescriptor};
pub use format::WarehouseOutputFormat;
pub use loader::{
    BigQueryLoader, BigQueryLoaderConfig, BigQueryLoaderConfigBuilder, LoadOutcome,
    WarehouseLoader, DEFAULT_BIGQUERY_URL,
};
