//! CLI module
//!
//! Command-line interface for running jobs.
//!
//! # Commands
//!
//! - `validate` - Check the output specification
//! - `run` - Stage records, commit and load them
//! - `describe` - Show the load job request for staged files
//! - `load` - Re-run the load over files kept by a failed load
//! - `formats` - List delegate output formats

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputStyle};
pub use runner::{apply_overrides, parse_records, Runner, ACCESS_TOKEN_ENV};
