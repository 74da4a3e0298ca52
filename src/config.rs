//! Job configuration
//!
//! A job is described by an immutable key-value [`JobConfiguration`] that is
//! built once at submission time and shared by reference with every task.
//! Keys are listed in [`keys`]; typed accessors parse them on demand.

use crate::error::{Error, Result};
use crate::types::{CreateDisposition, FileFormat, TableReference, TableSchema, WriteDisposition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Keys
// ============================================================================

/// Configuration keys consumed by bqstage
pub mod keys {
    /// Qualified target table id, `[project:]dataset.table`
    pub const OUTPUT_TABLE: &str = "bq.output.table";

    /// Staging directory URI
    pub const OUTPUT_PATH: &str = "bq.output.path";

    /// Staging file format (`NEWLINE_DELIMITED_JSON`, `CSV`, `AVRO`, `PARQUET`)
    pub const OUTPUT_FILE_FORMAT: &str = "bq.output.file.format";

    /// Registry name of the delegate output format
    pub const OUTPUT_FORMAT_CLASS: &str = "bq.output.format.class";

    /// Optional explicit table schema (JSON)
    pub const OUTPUT_TABLE_SCHEMA: &str = "bq.output.table.schema";

    /// Load write disposition
    pub const OUTPUT_WRITE_DISPOSITION: &str = "bq.output.write.disposition";

    /// Load create disposition
    pub const OUTPUT_CREATE_DISPOSITION: &str = "bq.output.create.disposition";

    /// Delete staged files once the load succeeded
    pub const OUTPUT_CLEANUP_STAGING: &str = "bq.output.cleanup.staging";

    /// Project that runs the load job and owns unqualified tables
    pub const PROJECT_ID: &str = "bq.project.id";

    /// Optional location for the load job
    pub const LOAD_LOCATION: &str = "bq.load.location";

    /// Load attempt number, appended to the load job id when above zero
    pub const LOAD_ATTEMPT: &str = "bq.load.attempt";

    /// Generic output compression flag shared by all file output formats
    pub const COMPRESS_OUTPUT: &str = "output.compress";
}

// ============================================================================
// Job Configuration
// ============================================================================

/// Immutable job configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobConfiguration {
    entries: BTreeMap<String, String>,
}

impl JobConfiguration {
    /// Start building a configuration
    pub fn builder() -> JobConfigurationBuilder {
        JobConfigurationBuilder::default()
    }

    /// Build from an iterator of key-value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a YAML (or JSON) document of string keys and scalar values
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(contents)?;
        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Null => continue,
                other => serde_json::to_string(&other)?,
            };
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    /// Load a configuration file (YAML or JSON)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Raw value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Raw value for a required key
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::missing_field(key))
    }

    /// Boolean value, falling back to `default` when unset
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                other => Err(Error::invalid_value(key, format!("'{other}' is not a boolean"))),
            },
        }
    }

    /// Iterate all entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Derive a builder seeded with these entries
    pub fn to_builder(&self) -> JobConfigurationBuilder {
        JobConfigurationBuilder {
            entries: self.entries.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------------

    /// Project running the load job
    pub fn project_id(&self) -> Option<&str> {
        self.get(keys::PROJECT_ID)
    }

    /// Target table
    pub fn table_reference(&self) -> Result<TableReference> {
        TableReference::parse(self.require(keys::OUTPUT_TABLE)?, self.project_id())
    }

    /// Staging directory URI exactly as configured
    pub fn staging_path(&self) -> Result<&str> {
        self.require(keys::OUTPUT_PATH)
    }

    /// Staging file format
    pub fn file_format(&self) -> Result<FileFormat> {
        self.require(keys::OUTPUT_FILE_FORMAT)?.parse()
    }

    /// Delegate output format name, if configured
    pub fn output_format_class(&self) -> Option<&str> {
        self.get(keys::OUTPUT_FORMAT_CLASS)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Explicit table schema, if one was configured
    pub fn table_schema(&self) -> Result<Option<TableSchema>> {
        self.get(keys::OUTPUT_TABLE_SCHEMA)
            .filter(|v| !v.trim().is_empty())
            .map(|json| {
                TableSchema::from_json(json)
                    .map_err(|e| Error::invalid_value(keys::OUTPUT_TABLE_SCHEMA, e.to_string()))
            })
            .transpose()
    }

    /// Whether output compression was requested
    pub fn compress_output(&self) -> Result<bool> {
        self.get_bool(keys::COMPRESS_OUTPUT, false)
    }

    /// Load write disposition
    pub fn write_disposition(&self) -> Result<WriteDisposition> {
        self.get(keys::OUTPUT_WRITE_DISPOSITION)
            .map_or(Ok(WriteDisposition::default()), |v| v.parse())
    }

    /// Load create disposition
    pub fn create_disposition(&self) -> Result<CreateDisposition> {
        self.get(keys::OUTPUT_CREATE_DISPOSITION)
            .map_or(Ok(CreateDisposition::default()), |v| v.parse())
    }

    /// Whether staged files are deleted after a successful load
    pub fn cleanup_staging(&self) -> Result<bool> {
        self.get_bool(keys::OUTPUT_CLEANUP_STAGING, true)
    }

    /// Load job location
    pub fn load_location(&self) -> Option<&str> {
        self.get(keys::LOAD_LOCATION)
    }

    /// Load attempt number (0 for the first load of a job)
    pub fn load_attempt(&self) -> Result<u32> {
        self.get(keys::LOAD_ATTEMPT)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map_or(Ok(0), |v| {
                v.parse().map_err(|_| {
                    Error::invalid_value(keys::LOAD_ATTEMPT, format!("'{v}' is not an attempt number"))
                })
            })
    }

    /// Parse every setting the commit trigger reads at job commit
    ///
    /// Run during output-spec validation so a bad setting fails the job
    /// before any record is written.
    pub fn validate(&self) -> Result<()> {
        self.table_reference()?;
        self.file_format()?;
        self.table_schema()?;
        self.write_disposition()?;
        self.create_disposition()?;
        self.cleanup_staging()?;
        self.load_attempt()?;
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Mutable builder used before job submission
#[derive(Debug, Clone, Default)]
pub struct JobConfigurationBuilder {
    entries: BTreeMap<String, String>,
}

impl JobConfigurationBuilder {
    /// Set an arbitrary key
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Remove a key
    #[must_use]
    pub fn unset(mut self, key: &str) -> Self {
        self.entries.remove(key);
        self
    }

    /// Set the generic output compression flag
    #[must_use]
    pub fn compress_output(self, enabled: bool) -> Self {
        self.set(keys::COMPRESS_OUTPUT, enabled.to_string())
    }

    /// Set the load job project
    #[must_use]
    pub fn project_id(self, project_id: impl Into<String>) -> Self {
        self.set(keys::PROJECT_ID, project_id)
    }

    /// Set the load attempt number
    #[must_use]
    pub fn load_attempt(self, attempt: u32) -> Self {
        self.set(keys::LOAD_ATTEMPT, attempt.to_string())
    }

    /// Configure a load with an explicit schema
    pub fn configure(
        self,
        qualified_table: &str,
        schema: &TableSchema,
        output_path: &str,
        file_format: FileFormat,
        output_format_class: &str,
    ) -> Result<Self> {
        let schema_json = serde_json::to_string(schema)?;
        Ok(self
            .configure_with_auto_schema(qualified_table, output_path, file_format, output_format_class)?
            .set(keys::OUTPUT_TABLE_SCHEMA, schema_json))
    }

    /// Configure a load whose schema is inferred by the warehouse
    pub fn configure_with_auto_schema(
        self,
        qualified_table: &str,
        output_path: &str,
        file_format: FileFormat,
        output_format_class: &str,
    ) -> Result<Self> {
        let default_project = self.entries.get(keys::PROJECT_ID).map(String::as_str);
        TableReference::parse(qualified_table, default_project)?;

        if output_path.trim().is_empty() {
            return Err(Error::invalid_value(keys::OUTPUT_PATH, "output path is empty"));
        }
        if output_format_class.trim().is_empty() {
            return Err(Error::invalid_value(
                keys::OUTPUT_FORMAT_CLASS,
                "output format class is empty",
            ));
        }

        Ok(self
            .set(keys::OUTPUT_TABLE, qualified_table)
            .set(keys::OUTPUT_PATH, output_path)
            .set(keys::OUTPUT_FILE_FORMAT, file_format.source_format())
            .set(keys::OUTPUT_FORMAT_CLASS, output_format_class)
            .unset(keys::OUTPUT_TABLE_SCHEMA))
    }

    /// Freeze the configuration
    pub fn build(self) -> JobConfiguration {
        JobConfiguration {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TableFieldSchema;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn auto_schema_config() -> JobConfiguration {
        JobConfiguration::builder()
            .configure_with_auto_schema(
                "domain:project:dataset.table",
                "gs://test_bucket/test_directory/",
                FileFormat::NewlineDelimitedJson,
                "text",
            )
            .unwrap()
            .build()
    }

    #[test]
    fn test_configure_with_auto_schema() {
        let conf = auto_schema_config();
        assert_eq!(
            conf.table_reference().unwrap(),
            TableReference::new("domain:project", "dataset", "table")
        );
        assert_eq!(conf.staging_path().unwrap(), "gs://test_bucket/test_directory/");
        assert_eq!(conf.file_format().unwrap(), FileFormat::NewlineDelimitedJson);
        assert_eq!(conf.output_format_class(), Some("text"));
        assert_eq!(conf.table_schema().unwrap(), None);
        assert!(!conf.compress_output().unwrap());
    }

    #[test]
    fn test_configure_with_schema() {
        let schema = TableSchema {
            fields: vec![TableFieldSchema::new("id", "INTEGER")],
        };
        let conf = JobConfiguration::builder()
            .configure(
                "p:d.t",
                &schema,
                "gs://b/dir",
                FileFormat::NewlineDelimitedJson,
                "json",
            )
            .unwrap()
            .build();
        assert_eq!(conf.table_schema().unwrap(), Some(schema));
    }

    #[test]
    fn test_configure_rejects_bad_table() {
        let result = JobConfiguration::builder().configure_with_auto_schema(
            "not-a-table",
            "gs://b/dir",
            FileFormat::Avro,
            "text",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_keys() {
        let conf = JobConfiguration::default();
        assert!(matches!(
            conf.staging_path(),
            Err(Error::MissingConfigField { .. })
        ));
        assert!(conf.table_reference().is_err());
        assert_eq!(conf.output_format_class(), None);
    }

    #[test]
    fn test_defaults() {
        let conf = auto_schema_config();
        assert_eq!(conf.write_disposition().unwrap(), WriteDisposition::WriteAppend);
        assert_eq!(
            conf.create_disposition().unwrap(),
            CreateDisposition::CreateIfNeeded
        );
        assert!(conf.cleanup_staging().unwrap());
    }

    #[test]
    fn test_get_bool() {
        let conf = auto_schema_config()
            .to_builder()
            .compress_output(true)
            .set("flag", "maybe")
            .build();
        assert!(conf.compress_output().unwrap());
        assert!(conf.get_bool("flag", false).is_err());
        assert!(conf.get_bool("absent", true).unwrap());
    }

    #[test]
    fn test_validate_accepts_complete_configuration() {
        auto_schema_config().validate().unwrap();
        auto_schema_config()
            .to_builder()
            .set(keys::OUTPUT_WRITE_DISPOSITION, "WRITE_TRUNCATE")
            .load_attempt(2)
            .build()
            .validate()
            .unwrap();
    }

    #[test_case(keys::OUTPUT_TABLE, "not a table" ; "bad table")]
    #[test_case(keys::OUTPUT_FILE_FORMAT, "ORC" ; "unknown file format")]
    #[test_case(keys::OUTPUT_TABLE_SCHEMA, "{\"fields\": 3}" ; "bad schema")]
    #[test_case(keys::OUTPUT_WRITE_DISPOSITION, "WRITE_SOMETIMES" ; "bad write disposition")]
    #[test_case(keys::OUTPUT_CREATE_DISPOSITION, "CREATE_MAYBE" ; "bad create disposition")]
    #[test_case(keys::OUTPUT_CLEANUP_STAGING, "maybe" ; "non boolean cleanup")]
    #[test_case(keys::LOAD_ATTEMPT, "-1" ; "negative load attempt")]
    fn test_validate_rejects_bad_setting(key: &str, value: &str) {
        let conf = auto_schema_config().to_builder().set(key, value).build();
        let err = conf.validate().unwrap_err();
        assert!(err.is_config_error(), "{key}: {err}");
    }

    #[test]
    fn test_validate_requires_table_and_format() {
        for key in [keys::OUTPUT_TABLE, keys::OUTPUT_FILE_FORMAT] {
            let conf = auto_schema_config().to_builder().unset(key).build();
            assert!(matches!(
                conf.validate(),
                Err(Error::MissingConfigField { .. })
            ));
        }
    }

    #[test]
    fn test_load_attempt() {
        assert_eq!(auto_schema_config().load_attempt().unwrap(), 0);
        let conf = auto_schema_config().to_builder().load_attempt(3).build();
        assert_eq!(conf.load_attempt().unwrap(), 3);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
bq.output.table: "project:dataset.table"
bq.output.path: "gs://bucket/dir/"
bq.output.file.format: PARQUET
bq.output.format.class: parquet
output.compress: false
bq.output.table.schema: null
"#;
        let conf = JobConfiguration::from_yaml_str(yaml).unwrap();
        assert_eq!(conf.file_format().unwrap(), FileFormat::Parquet);
        assert!(!conf.compress_output().unwrap());
        assert_eq!(conf.get(keys::OUTPUT_TABLE_SCHEMA), None);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(
            &path,
            r#"{"bq.output.table": "p:d.t", "bq.output.path": "/tmp/x"}"#,
        )
        .unwrap();
        let conf = JobConfiguration::from_file(&path).unwrap();
        assert_eq!(conf.staging_path().unwrap(), "/tmp/x");

        assert!(JobConfiguration::from_file(dir.path().join("missing.yaml")).is_err());
    }
}
