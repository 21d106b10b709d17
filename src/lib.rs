//! dep-updater - automated npm dependency maintenance
//!
//! Finds outdated dependencies, classifies them by risk, pushes safe updates on a fresh
//! branch with a pull/merge request on GitHub, GitLab or Bitbucket, and notifies a human
//! about major updates.

#![allow(clippy::uninlined_format_args)] // Style preference
#![allow(clippy::format_push_string)] // Performance improvement but stylistic
#![allow(clippy::future_not_send)] // Trait objects held across awaits

pub mod changelog;
pub mod changeset;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod logger;
pub mod manifest;
pub mod notifier;
pub mod pipeline;
pub mod platform;
pub mod review;
pub mod scanner;
pub mod scheduler;
pub mod services;
pub mod ui;
pub mod updates;

// Re-export important structs and functions for easier testing
pub use config::Config;
pub use error::{Result, UpdaterError};
pub use pipeline::{Pipeline, PipelineDeps, RunOutcome, RunReport};
pub use platform::{Platform, PlatformTarget};
pub use updates::{ClassifiedUpdates, VersionDelta, classify, parse_updates};
