//! Job module
//!
//! Identifies jobs and task attempts and carries the shared, read-only job
//! state (configuration and staging store) into every task.
//!
//! # Overview
//!
//! - `JobId`, `TaskAttemptId` - Identifiers
//! - `JobContext` - Configuration and staging store shared by all tasks of a job
//! - `TaskAttemptContext` - One execution attempt of one task

mod context;
mod types;

pub use context::{JobContext, TaskAttemptContext};
pub use types::{JobId, JobState, TaskAttemptId};
