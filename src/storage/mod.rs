//! Staging storage module
//!
//! Resolves a staging directory URI to an object store and provides the few
//! filesystem operations the output layer relies on.
//!
//! # Overview
//!
//! - `StagingLocation` - Parsed staging URI (scheme, bucket, prefix)
//! - `StagingStore` - Existence checks, uploads, listing, moves and deletes
//!   below the staging directory (S3, R2, GCS, Azure, in-memory, local)

mod location;
mod store;

pub use location::StagingLocation;
pub use store::{StagedObject, StagingStore};
