//! Common types used throughout bqstage
//!
//! This module contains the warehouse-facing value types shared by the
//! configuration, output and commit modules.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Table Reference
// ============================================================================

static PROJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9.:_\-]+$").unwrap());
static DATASET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());
static TABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-$]+$").unwrap());

/// Fully qualified warehouse table identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReference {
    /// Build a table reference from its parts
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    /// Parse `[project:]dataset.table`
    ///
    /// Project ids may themselves contain a domain prefix
    /// (`domain:project:dataset.table`). When the project is omitted,
    /// `default_project` is used.
    pub fn parse(qualified: &str, default_project: Option<&str>) -> Result<Self> {
        let invalid = |message: &str| {
            Error::invalid_value(
                "table",
                format!("'{qualified}' is not a valid table id: {message}"),
            )
        };

        let (head, table_id) = qualified
            .rsplit_once('.')
            .ok_or_else(|| invalid("expected [project:]dataset.table"))?;

        let (project_id, dataset_id) = match head.rsplit_once(':') {
            Some((project, dataset)) => (project.to_string(), dataset),
            None => (
                default_project
                    .ok_or_else(|| invalid("no project given and no default project configured"))?
                    .to_string(),
                head,
            ),
        };

        if !PROJECT_RE.is_match(&project_id) {
            return Err(invalid("bad project id"));
        }
        if !DATASET_RE.is_match(dataset_id) {
            return Err(invalid("bad dataset id"));
        }
        if !TABLE_RE.is_match(table_id) {
            return Err(invalid("bad table id"));
        }

        Ok(Self::new(project_id, dataset_id, table_id))
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

// ============================================================================
// File Format
// ============================================================================

/// Staging serializations the warehouse can bulk-load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileFormat {
    #[default]
    NewlineDelimitedJson,
    Csv,
    Avro,
    Parquet,
}

impl FileFormat {
    /// Name used in the load job's `sourceFormat`
    pub fn source_format(self) -> &'static str {
        match self {
            FileFormat::NewlineDelimitedJson => "NEWLINE_DELIMITED_JSON",
            FileFormat::Csv => "CSV",
            FileFormat::Avro => "AVRO",
            FileFormat::Parquet => "PARQUET",
        }
    }

    /// Conventional file extension, including the dot
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::NewlineDelimitedJson => ".json",
            FileFormat::Csv => ".csv",
            FileFormat::Avro => ".avro",
            FileFormat::Parquet => ".parquet",
        }
    }

    /// Whether the files carry their own schema
    pub fn is_self_describing(self) -> bool {
        matches!(self, FileFormat::Avro | FileFormat::Parquet)
    }
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEWLINE_DELIMITED_JSON" | "JSON" | "NDJSON" => Ok(FileFormat::NewlineDelimitedJson),
            "CSV" => Ok(FileFormat::Csv),
            "AVRO" => Ok(FileFormat::Avro),
            "PARQUET" => Ok(FileFormat::Parquet),
            other => Err(Error::invalid_value(
                "file format",
                format!("unsupported file format '{other}'"),
            )),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_format())
    }
}

// ============================================================================
// Dispositions
// ============================================================================

/// What the load does when the table already holds data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    #[default]
    WriteAppend,
    WriteTruncate,
    WriteEmpty,
}

impl FromStr for WriteDisposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WRITE_APPEND" => Ok(WriteDisposition::WriteAppend),
            "WRITE_TRUNCATE" => Ok(WriteDisposition::WriteTruncate),
            "WRITE_EMPTY" => Ok(WriteDisposition::WriteEmpty),
            other => Err(Error::invalid_value(
                "write disposition",
                format!("unsupported value '{other}'"),
            )),
        }
    }
}

/// Whether the load may create the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    #[default]
    CreateIfNeeded,
    CreateNever,
}

impl FromStr for CreateDisposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE_IF_NEEDED" => Ok(CreateDisposition::CreateIfNeeded),
            "CREATE_NEVER" => Ok(CreateDisposition::CreateNever),
            other => Err(Error::invalid_value(
                "create disposition",
                format!("unsupported value '{other}'"),
            )),
        }
    }
}

// ============================================================================
// Table Schema
// ============================================================================

/// One column of an explicit table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFieldSchema {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableFieldSchema>,
}

impl TableFieldSchema {
    /// Create a nullable scalar column
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            mode: None,
            fields: Vec::new(),
        }
    }
}

/// Explicit table schema, serialized as the warehouse's `{"fields": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableFieldSchema>,
}

impl TableSchema {
    /// Parse either `{"fields": [...]}` or a bare field array
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        let schema = if value.is_array() {
            TableSchema {
                fields: serde_json::from_value(value)?,
            }
        } else {
            serde_json::from_value(value)?
        };
        if schema.fields.is_empty() {
            return Err(Error::invalid_value("table schema", "schema has no fields"));
        }
        Ok(schema)
    }
}

/// How the target table's schema is declared to the load job
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchemaMode {
    /// Let the warehouse infer the schema from the staged files
    #[default]
    Auto,
    /// Declare the schema explicitly
    Explicit(TableSchema),
}
