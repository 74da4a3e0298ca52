//! Parquet record writer
//!
//! Buffers a task attempt's JSON records, infers an Arrow schema from them and
//! uploads one Parquet file on close.

use crate::error::{Error, Result};
use crate::storage::StagingStore;
use crate::types::JsonValue;
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use async_trait::async_trait;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

use super::traits::RecordWriter;

/// Rows decoded into one Arrow batch at a time
const DECODE_BATCH_SIZE: usize = 8192;

/// Configuration for the Parquet writer
///
/// Column-chunk compression is internal to the Parquet file and is readable
/// by the warehouse; it is unrelated to whole-file output compression.
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
    dictionary_enabled: bool,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024, // 1M rows
            dictionary_enabled: true,
        }
    }
}

impl ParquetWriterConfig {
    /// Create a new config with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use no column compression
    #[must_use]
    pub fn uncompressed(mut self) -> Self {
        self.compression = Compression::UNCOMPRESSED;
        self
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Enable or disable dictionary encoding
    #[must_use]
    pub fn with_dictionary(mut self, enabled: bool) -> Self {
        self.dictionary_enabled = enabled;
        self
    }

    /// Get row group size
    #[must_use]
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .set_dictionary_enabled(self.dictionary_enabled)
            .build()
    }
}

/// Parquet writer for one task attempt
pub struct ParquetRecordWriter {
    store: Arc<StagingStore>,
    path: String,
    config: ParquetWriterConfig,
    records: Vec<JsonValue>,
}

impl ParquetRecordWriter {
    pub(crate) fn new(store: Arc<StagingStore>, path: String, config: ParquetWriterConfig) -> Self {
        Self {
            store,
            path,
            config,
            records: Vec::new(),
        }
    }

    /// Encode buffered records into Parquet bytes
    fn encode(records: &[JsonValue], config: &ParquetWriterConfig) -> Result<Vec<u8>> {
        let schema = Arc::new(infer_json_schema_from_iterator(records.iter().map(Ok))?);
        let mut decoder = ReaderBuilder::new(Arc::clone(&schema))
            .with_batch_size(DECODE_BATCH_SIZE)
            .build_decoder()?;

        let mut writer = ArrowWriter::try_new(Vec::new(), schema, Some(config.build_properties()))
            .map_err(|e| Error::output(format!("Failed to create Parquet writer: {e}")))?;

        for chunk in records.chunks(DECODE_BATCH_SIZE) {
            decoder.serialize(chunk)?;
            if let Some(batch) = decoder.flush()? {
                writer.write(&batch)?;
            }
        }

        Ok(writer.into_inner()?)
    }
}

#[async_trait]
impl RecordWriter for ParquetRecordWriter {
    async fn write(&mut self, record: &JsonValue) -> Result<()> {
        if !record.is_object() {
            return Err(Error::output(format!(
                "Parquet output expects JSON objects, got: {record}"
            )));
        }
        self.records.push(record.clone());
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<u64> {
        if self.records.is_empty() {
            return Ok(0);
        }

        let bytes = Self::encode(&self.records, &self.config)?;
        self.store.put(&self.path, Bytes::from(bytes)).await?;
        Ok(self.records.len() as u64)
    }
}
