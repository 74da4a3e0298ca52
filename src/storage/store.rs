//! Object store access for a staging directory

use super::location::StagingLocation;
use crate::error::{Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A file found below the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedObject {
    /// Path relative to the staging directory
    pub relative: String,
    /// Full URI
    pub uri: String,
    /// Size in bytes
    pub size: usize,
}

impl StagedObject {
    /// Hidden files (`_SUCCESS`, `_temporary/..`, dotfiles) are bookkeeping, not data
    pub fn is_hidden(&self) -> bool {
        self.relative
            .split('/')
            .any(|part| part.starts_with('_') || part.starts_with('.'))
    }
}

/// Staging directory bound to its object store
#[derive(Clone)]
pub struct StagingStore {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Where the staging directory lives
    location: StagingLocation,
}

impl fmt::Debug for StagingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl StagingStore {
    /// Parse a staging URL and create the appropriate object store
    ///
    /// Cloud credentials are read from the environment by the
    /// `object_store` builders.
    pub fn from_url(url: &str) -> Result<Self> {
        let location = StagingLocation::parse(url)?;
        let store: Arc<dyn ObjectStore> = match location.scheme() {
            "gs" => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(location.bucket())
                    .build()
                    .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?,
            ),
            "s3" | "r2" => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(location.bucket());
                // R2 endpoint: https://<account_id>.r2.cloudflarestorage.com
                if location.scheme() == "r2" {
                    if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                        builder = builder.with_endpoint(endpoint);
                    }
                }
                Arc::new(builder.build().map_err(|e| {
                    Error::config(format!("Failed to create {} client: {e}", location.scheme()))
                })?)
            }
            "az" => Arc::new(
                MicrosoftAzureBuilder::from_env()
                    .with_container_name(location.bucket())
                    .build()
                    .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?,
            ),
            "memory" => Arc::new(InMemory::new()),
            _ => Arc::new(LocalFileSystem::new()),
        };

        Ok(Self { store, location })
    }

    /// Bind an existing object store to a staging URL
    pub fn with_store(url: &str, store: Arc<dyn ObjectStore>) -> Result<Self> {
        Ok(Self {
            store,
            location: StagingLocation::parse(url)?,
        })
    }

    /// Staging location
    pub fn location(&self) -> &StagingLocation {
        &self.location
    }

    /// Underlying object store
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn object_path(&self, relative: &str) -> ObjectPath {
        ObjectPath::from(self.location.key_for(relative))
    }

    fn root_path(&self) -> Option<ObjectPath> {
        (!self.location.prefix().is_empty()).then(|| ObjectPath::from(self.location.prefix()))
    }

    /// Whether the staging directory already exists
    ///
    /// Object stores have no real directories: the directory exists as soon
    /// as any object (or placeholder) lives below it.
    pub async fn exists(&self) -> Result<bool> {
        if let Some(local) = self.location.local_path() {
            return Ok(tokio::fs::try_exists(&local).await?);
        }

        let root = self.root_path();
        let listing = self
            .store
            .list_with_delimiter(root.as_ref())
            .await
            .map_err(|e| Error::storage(format!("Failed to list {}: {e}", self.location)))?;

        Ok(!listing.objects.is_empty() || !listing.common_prefixes.is_empty())
    }

    /// Write bytes to a file below the staging directory
    pub async fn put(&self, relative: &str, data: Bytes) -> Result<String> {
        let path = self.object_path(relative);
        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| Error::storage(format!("Failed to write {path}: {e}")))?;

        let uri = self.location.uri_for(relative);
        debug!("Wrote staged file {uri}");
        Ok(uri)
    }

    /// Read a staged file
    pub async fn get(&self, relative: &str) -> Result<Bytes> {
        let path = self.object_path(relative);
        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| Error::storage(format!("Failed to read {path}: {e}")))?;
        Ok(result.bytes().await?)
    }

    /// List all files below `relative` (recursively), sorted by path
    pub async fn list(&self, relative: &str) -> Result<Vec<StagedObject>> {
        let root = if relative.trim_matches('/').is_empty() {
            self.root_path()
        } else {
            Some(self.object_path(relative))
        };

        let metas: Vec<_> = self
            .store
            .list(root.as_ref())
            .try_collect()
            .await
            .map_err(|e| Error::storage(format!("Failed to list {}: {e}", self.location)))?;

        let strip = if self.location.prefix().is_empty() {
            String::new()
        } else {
            format!("{}/", self.location.prefix())
        };

        let mut objects: Vec<StagedObject> = metas
            .into_iter()
            .map(|meta| {
                let key = meta.location.as_ref();
                let relative = key.strip_prefix(&strip).unwrap_or(key).to_string();
                StagedObject {
                    uri: self.location.uri_for(&relative),
                    relative,
                    size: meta.size,
                }
            })
            .collect();
        objects.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(objects)
    }

    /// Move a file inside the staging directory
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.object_path(from);
        let to_path = self.object_path(to);
        self.store
            .rename(&from_path, &to_path)
            .await
            .map_err(|e| Error::storage(format!("Failed to move {from_path} to {to_path}: {e}")))
    }

    /// Delete every file below `relative`, returning how many were removed
    pub async fn delete_prefix(&self, relative: &str) -> Result<usize> {
        let objects = self.list(relative).await?;
        for object in &objects {
            let path = self.object_path(&object.relative);
            self.store
                .delete(&path)
                .await
                .map_err(|e| Error::storage(format!("Failed to delete {path}: {e}")))?;
        }

        if let Some(local) = self.location.local_path() {
            let dir = local.join(relative.trim_matches('/'));
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(objects.len())
    }

    /// Delete the whole staging directory
    pub async fn delete_all(&self) -> Result<usize> {
        self.delete_prefix("").await
    }
}
