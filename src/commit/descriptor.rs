//! Output commit descriptor
//!
//! The warehouse-facing description of one load: what table, which staged
//! files, what format and schema.

use crate::error::Result;
use crate::job::{JobContext, JobId};
use crate::types::{
    CreateDisposition, FileFormat, JsonValue, SchemaMode, TableReference, WriteDisposition,
};
use serde_json::json;

/// Upper bound on load job id length accepted by the warehouse
const MAX_LOAD_JOB_ID_LEN: usize = 1024;

/// Deterministic load job id for a job, target table and load attempt
///
/// Re-running the commit for the same job yields the same id, which lets the
/// warehouse reject the duplicate instead of loading twice. Attempts above
/// zero get an `_a<n>` suffix so a load that failed can be submitted again.
pub fn load_job_id(job_id: &JobId, table: &TableReference, attempt: u32) -> String {
    let suffix = if attempt > 0 {
        format!("_a{attempt}")
    } else {
        String::new()
    };
    let raw = format!(
        "bqstage_{}_{}_{}_{}",
        job_id, table.project_id, table.dataset_id, table.table_id
    );
    let mut id: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_LOAD_JOB_ID_LEN - suffix.len())
        .collect();
    id.push_str(&suffix);
    id
}

/// Everything the warehouse needs to load one job's staged output
#[derive(Debug, Clone, PartialEq)]
pub struct OutputCommitDescriptor {
    pub load_job_id: String,
    pub project_id: String,
    pub location: Option<String>,
    pub table: TableReference,
    pub staging_path: String,
    pub file_format: FileFormat,
    pub schema_mode: SchemaMode,
    pub write_disposition: WriteDisposition,
    pub create_disposition: CreateDisposition,
    pub source_uris: Vec<String>,
}

impl OutputCommitDescriptor {
    /// Build the descriptor from the job configuration
    pub fn from_job(job: &JobContext, source_uris: Vec<String>) -> Result<Self> {
        let conf = job.configuration();
        let table = conf.table_reference()?;
        let schema_mode = match conf.table_schema()? {
            Some(schema) => SchemaMode::Explicit(schema),
            None => SchemaMode::Auto,
        };

        Ok(Self {
            load_job_id: load_job_id(job.job_id(), &table, conf.load_attempt()?),
            project_id: conf
                .project_id()
                .map_or_else(|| table.project_id.clone(), str::to_string),
            location: conf.load_location().map(str::to_string),
            staging_path: conf.staging_path()?.to_string(),
            file_format: conf.file_format()?,
            write_disposition: conf.write_disposition()?,
            create_disposition: conf.create_disposition()?,
            table,
            schema_mode,
            source_uris,
        })
    }

    /// Whether the warehouse should infer the schema
    ///
    /// Self-describing formats carry their schema in the files.
    pub fn autodetect(&self) -> bool {
        matches!(self.schema_mode, SchemaMode::Auto) && !self.file_format.is_self_describing()
    }

    /// The `configuration.load` section of a load job request
    pub fn to_load_configuration(&self) -> JsonValue {
        let mut load = json!({
            "sourceUris": self.source_uris,
            "sourceFormat": self.file_format.source_format(),
            "destinationTable": {
                "projectId": self.table.project_id,
                "datasetId": self.table.dataset_id,
                "tableId": self.table.table_id,
            },
            "writeDisposition": self.write_disposition,
            "createDisposition": self.create_disposition,
        });

        if let SchemaMode::Explicit(schema) = &self.schema_mode {
            load["schema"] = json!(schema);
        }
        if self.autodetect() {
            load["autodetect"] = json!(true);
        }
        load
    }

    /// Full load job request body
    pub fn to_job_request(&self) -> JsonValue {
        let mut reference = json!({
            "projectId": self.project_id,
            "jobId": self.load_job_id,
        });
        if let Some(location) = &self.location {
            reference["location"] = json!(location);
        }

        json!({
            "jobReference": reference,
            "configuration": { "load": self.to_load_configuration() },
        })
    }
}
