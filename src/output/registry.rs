//! Delegate output format registry
//!
//! Maps the configured output format class name to a factory, so delegates
//! are resolved from configuration without reflection.

use super::file::FileOutputFormat;
use super::traits::OutputFormat;
use crate::config::{keys, JobConfiguration};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Factory producing a fresh delegate instance
pub type DelegateFactory = Arc<dyn Fn() -> Arc<dyn OutputFormat> + Send + Sync>;

/// Named delegate factories with an optional default
#[derive(Clone, Default)]
pub struct DelegateRegistry {
    factories: BTreeMap<String, DelegateFactory>,
    default_class: Option<String>,
}

impl fmt::Debug for DelegateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateRegistry")
            .field("classes", &self.factories.keys().collect::<Vec<_>>())
            .field("default_class", &self.default_class)
            .finish()
    }
}

impl DelegateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `text`, `json` and `parquet` formats
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("text", || Arc::new(FileOutputFormat::text()));
        registry.register("json", || Arc::new(FileOutputFormat::json()));
        registry.register("parquet", || Arc::new(FileOutputFormat::parquet()));
        registry
    }

    /// Register a factory under a class name, replacing any previous entry
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn OutputFormat> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Class used when the configuration names none
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_class = Some(name.into());
        self
    }

    /// Registered class names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate a class by name
    pub fn instantiate(&self, name: &str) -> Result<Arc<dyn OutputFormat>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownOutputFormat {
                name: name.to_string(),
            })?;
        Ok(factory())
    }

    /// Instantiate the class named by the configuration (or the default)
    pub fn resolve(&self, conf: &JobConfiguration) -> Result<Arc<dyn OutputFormat>> {
        let class = conf
            .output_format_class()
            .or(self.default_class.as_deref())
            .ok_or_else(|| Error::missing_field(keys::OUTPUT_FORMAT_CLASS))?;

        debug!("Resolving delegate output format '{class}'");
        self.instantiate(class)
    }
}
