//! Forwarding output format
//!
//! Wraps a delegate output format and gates it behind the warehouse's
//! staging constraints. The checks in [`ForwardingOutputFormat::check_output_specs`]
//! always run before the delegate is consulted:
//!
//! 1. the job configuration must parse (table, file format, schema,
//!    dispositions, cleanup flag),
//! 2. the staging path must not exist yet,
//! 3. output compression must be disabled,
//! 4. the delegate's own validation must pass.
//!
//! Everything else (writers, committers) is the delegate's, returned untouched.

use super::registry::DelegateRegistry;
use super::traits::{OutputCommitter, OutputFormat, RecordWriter};
use crate::config::JobConfiguration;
use crate::error::{Error, Result};
use crate::job::TaskAttemptContext;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Committer slot filled at most once per delegate
type CommitterCell = Arc<OnceCell<Arc<dyn OutputCommitter>>>;

/// Output format forwarding to a configured or injected delegate
pub struct ForwardingOutputFormat {
    registry: Arc<DelegateRegistry>,
    delegate: Mutex<Option<Arc<dyn OutputFormat>>>,
    committer: Mutex<CommitterCell>,
}

impl Default for ForwardingOutputFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardingOutputFormat {
    /// Forwarding format resolving delegates from the built-in registry
    pub fn new() -> Self {
        Self::with_registry(Arc::new(DelegateRegistry::builtin()))
    }

    /// Forwarding format resolving delegates from `registry`
    pub fn with_registry(registry: Arc<DelegateRegistry>) -> Self {
        Self {
            registry,
            delegate: Mutex::new(None),
            committer: Mutex::new(CommitterCell::default()),
        }
    }

    /// Inject a delegate, or clear it so the next resolution reads configuration
    ///
    /// The memoized committer belongs to the previous delegate and is dropped.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn OutputFormat>>) {
        *self.delegate.lock().unwrap_or_else(PoisonError::into_inner) = delegate;
        *self.committer.lock().unwrap_or_else(PoisonError::into_inner) = CommitterCell::default();
    }

    /// Resolve the delegate
    ///
    /// An injected or previously resolved delegate is returned as is;
    /// otherwise the configured class is instantiated once and cached.
    pub fn get_delegate(&self, conf: &JobConfiguration) -> Result<Arc<dyn OutputFormat>> {
        let mut slot = self.delegate.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delegate) = slot.as_ref() {
            return Ok(Arc::clone(delegate));
        }

        let delegate = self.registry.resolve(conf)?;
        debug!("Resolved delegate output format '{}'", delegate.name());
        *slot = Some(Arc::clone(&delegate));
        Ok(delegate)
    }

    /// The delegate's committer, unmodified and uncached
    pub async fn create_committer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Arc<dyn OutputCommitter>> {
        let delegate = self.get_delegate(context.configuration())?;
        delegate.get_output_committer(context).await
    }
}

#[async_trait]
impl OutputFormat for ForwardingOutputFormat {
    fn name(&self) -> &str {
        "forwarding"
    }

    async fn check_output_specs(&self, context: &TaskAttemptContext) -> Result<()> {
        let conf = context.configuration();
        let delegate = self.get_delegate(conf)?;

        if let Err(e) = conf.validate() {
            warn!("Refusing to start: {e}");
            return Err(e);
        }

        let path = conf.staging_path()?;
        if context.store().exists().await? {
            warn!("Refusing to start: output path '{path}' already exists");
            return Err(Error::output_path_exists(path));
        }

        if conf.compress_output()? {
            warn!("Refusing to start: compressed output requested");
            return Err(Error::CompressionUnsupported);
        }

        delegate.check_output_specs(context).await
    }

    async fn get_record_writer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>> {
        let delegate = self.get_delegate(context.configuration())?;
        delegate.get_record_writer(context).await
    }

    async fn get_output_committer(
        &self,
        context: &TaskAttemptContext,
    ) -> Result<Arc<dyn OutputCommitter>> {
        let cell = self.committer.lock().unwrap_or_else(PoisonError::into_inner).clone();
        cell.get_or_try_init(|| self.create_committer(context))
            .await
            .cloned()
    }
}
