//! Staging path parsing

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Component, PathBuf};

/// A parsed staging directory URI
///
/// Supported formats:
/// - `gs://bucket/path/` - Google Cloud Storage
/// - `s3://bucket/path/` - AWS S3
/// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible)
/// - `az://container/path/` - Azure Blob Storage
/// - `memory://bucket/path/` - In-process store
/// - `/local/path/`, `./path/` or `file:///path/` - Local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLocation {
    /// URI exactly as configured
    url: String,
    /// Scheme (gs, s3, r2, az, memory, file)
    scheme: String,
    /// Bucket or container; empty for local paths
    bucket: String,
    /// Directory prefix inside the bucket, without surrounding slashes
    prefix: String,
}

impl StagingLocation {
    /// Parse a staging URI
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(Error::config("Staging path is empty"));
        }

        for scheme in ["gs", "s3", "r2", "az", "memory"] {
            if let Some(rest) = trimmed.strip_prefix(&format!("{scheme}://")) {
                return Self::parse_bucketed(url, scheme, rest);
            }
        }

        Self::parse_local(url, trimmed.strip_prefix("file://").unwrap_or(trimmed))
    }

    fn parse_bucketed(url: &str, scheme: &str, without_scheme: &str) -> Result<Self> {
        let (bucket, prefix) = match without_scheme.find('/') {
            Some(idx) => (&without_scheme[..idx], &without_scheme[idx + 1..]),
            None => (without_scheme, ""),
        };

        if bucket.is_empty() {
            return Err(Error::config(format!("Missing bucket in staging path: {url}")));
        }

        Ok(Self {
            url: url.to_string(),
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        })
    }

    fn parse_local(url: &str, path: &str) -> Result<Self> {
        let mut absolute = PathBuf::from(path);
        if absolute.is_relative() {
            absolute = std::env::current_dir()?.join(absolute);
        }

        // `.` and `..` are resolved lexically
        let mut normalized: Vec<String> = Vec::new();
        for component in absolute.components() {
            match component {
                Component::Normal(part) => normalized.push(part.to_string_lossy().into_owned()),
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        Ok(Self {
            url: url.to_string(),
            scheme: "file".to_string(),
            bucket: String::new(),
            prefix: normalized.join("/"),
        })
    }

    /// URI exactly as configured
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Scheme (gs, s3, r2, az, memory, file)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Bucket or container name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Directory prefix inside the bucket
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Check if this is a local filesystem path
    pub fn is_local(&self) -> bool {
        self.scheme == "file"
    }

    /// Absolute filesystem path for local locations
    pub fn local_path(&self) -> Option<PathBuf> {
        self.is_local().then(|| PathBuf::from(format!("/{}", self.prefix)))
    }

    /// Key of `relative` inside the bucket
    pub fn key_for(&self, relative: &str) -> String {
        let relative = relative.trim_matches('/');
        match (self.prefix.is_empty(), relative.is_empty()) {
            (true, _) => relative.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{relative}", self.prefix),
        }
    }

    /// Full URI of `relative` below the staging directory
    pub fn uri_for(&self, relative: &str) -> String {
        let key = self.key_for(relative);
        if self.is_local() {
            format!("/{key}")
        } else {
            format!("{}://{}/{key}", self.scheme, self.bucket)
        }
    }
}

impl fmt::Display for StagingLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
