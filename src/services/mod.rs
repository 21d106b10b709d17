//! Services module for the updater
//!
//! - `ChangeCommitter` - branch, stage, commit and push a change set

pub mod committer;

pub use committer::ChangeCommitter;
