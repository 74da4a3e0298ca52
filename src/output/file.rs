//! Built-in file output formats
//!
//! Each task attempt writes a single `part-NNNNN.<ext>` file into its private
//! `_temporary/<attempt>/` directory; the [`FileOutputCommitter`] promotes it
//! into the staging root on task commit.

use super::committer::FileOutputCommitter;
use super::traits::{OutputCommitter, OutputFormat, RecordWriter};
use super::writer::{ParquetRecordWriter, ParquetWriterConfig};
use crate::error::{Error, Result};
use crate::job::TaskAttemptContext;
use crate::storage::StagingStore;
use crate::types::JsonValue;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Serialization used for staged files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEncoding {
    /// One line per record; strings are written verbatim, other values as JSON
    Text,
    /// Newline-delimited JSON objects
    Json,
    /// Parquet
    Parquet,
}

impl FileEncoding {
    /// Registry name
    pub fn name(self) -> &'static str {
        match self {
            FileEncoding::Text => "text",
            FileEncoding::Json => "json",
            FileEncoding::Parquet => "parquet",
        }
    }

    /// File extension, including the dot
    pub fn extension(self) -> &'static str {
        match self {
            FileEncoding::Text => ".txt",
            FileEncoding::Json => ".json",
            FileEncoding::Parquet => ".parquet",
        }
    }
}

/// Output format writing uncompressed staged files
#[derive(Debug, Clone)]
pub struct FileOutputFormat {
    encoding: FileEncoding,
    parquet: ParquetWriterConfig,
}

impl FileOutputFormat {
    /// Line-delimited text
    pub fn text() -> Self {
        Self::new(FileEncoding::Text)
    }

    /// Newline-delimited JSON
    pub fn json() -> Self {
        Self::new(FileEncoding::Json)
    }

    /// Parquet
    pub fn parquet() -> Self {
        Self::new(FileEncoding::Parquet)
    }

    fn new(encoding: FileEncoding) -> Self {
        Self {
            encoding,
            parquet: ParquetWriterConfig::default(),
        }
    }

    /// Override the Parquet writer settings
    #[must_use]
    pub fn with_parquet_config(mut self, config: ParquetWriterConfig) -> Self {
        self.parquet = config;
        self
    }

    /// Encoding of the staged files
    pub fn encoding(&self) -> FileEncoding {
        self.encoding
    }

    /// Path (relative to the staging root) of an attempt's part file
    pub fn part_file(&self, context: &TaskAttemptContext) -> String {
        format!(
            "{}/part-{:05}{}",
            context.attempt_dir(),
            context.task(),
            self.encoding.extension()
        )
    }
}

#[async_trait]
impl OutputFormat for FileOutputFormat {
    fn name(&self) -> &str {
        self.encoding.name()
    }

    async fn check_output_specs(&self, context: &TaskAttemptContext) -> Result<()> {
        let path = context.configuration().staging_path()?;
        if context.store().exists().await? {
            return Err(Error::output_path_exists(path));
        }
        Ok(())
    }

    async fn get_record_writer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>> {
        let path = self.part_file(context);
        debug!("Opening {} writer for {path}", self.encoding.name());

        let store = Arc::clone(context.store());
        Ok(match self.encoding {
            FileEncoding::Text | FileEncoding::Json => {
                Box::new(LineRecordWriter::new(store, path, self.encoding))
            }
            FileEncoding::Parquet => {
                Box::new(ParquetRecordWriter::new(store, path, self.parquet.clone()))
            }
        })
    }

    async fn get_output_committer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Arc<dyn OutputCommitter>> {
        Ok(Arc::new(FileOutputCommitter::new(Arc::clone(context.store()))))
    }
}

/// Buffers line-oriented output and uploads it on close
pub struct LineRecordWriter {
    store: Arc<StagingStore>,
    path: String,
    encoding: FileEncoding,
    buffer: Vec<u8>,
    rows_written: u64,
}

impl LineRecordWriter {
    fn new(store: Arc<StagingStore>, path: String, encoding: FileEncoding) -> Self {
        Self {
            store,
            path,
            encoding,
            buffer: Vec::new(),
            rows_written: 0,
        }
    }
}

#[async_trait]
impl RecordWriter for LineRecordWriter {
    async fn write(&mut self, record: &JsonValue) -> Result<()> {
        match (self.encoding, record) {
            (FileEncoding::Text, JsonValue::String(line)) => {
                self.buffer.extend_from_slice(line.as_bytes());
            }
            (FileEncoding::Json, value) if !value.is_object() => {
                return Err(Error::output(format!(
                    "Newline-delimited JSON output expects objects, got: {value}"
                )));
            }
            (_, value) => serde_json::to_writer(&mut self.buffer, value)?,
        }
        self.buffer.push(b'\n');
        self.rows_written += 1;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<u64> {
        // Empty attempts leave no file behind
        if self.rows_written == 0 {
            return Ok(0);
        }
        let this = *self;
        this.store
            .put(&this.path, Bytes::from(this.buffer))
            .await?;
        Ok(this.rows_written)
    }
}
