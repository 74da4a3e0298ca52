//! Output module
//!
//! Output formats, record writers and committers.
//!
//! # Overview
//!
//! This module provides:
//! - The `OutputFormat`, `RecordWriter` and `OutputCommitter` traits
//! - `ForwardingOutputFormat` - validates staging constraints, then forwards
//!   every call to a delegate format
//! - `DelegateRegistry` - resolves the configured delegate class
//! - Built-in delegates writing text, newline-delimited JSON and Parquet
//! - `FileOutputCommitter` - promotes attempt files into the staging root

mod committer;
mod file;
mod forwarding;
mod registry;
mod traits;
mod writer;

pub use committer::{FileOutputCommitter, SUCCESS_MARKER, TEMPORARY_DIR};
pub use file::{FileEncoding, FileOutputFormat, LineRecordWriter};
pub use forwarding::ForwardingOutputFormat;
pub use registry::{DelegateFactory, DelegateRegistry};
pub use traits::{OutputCommitter, OutputFormat, RecordWriter};
pub use writer::{ParquetRecordWriter, ParquetWriterConfig};
