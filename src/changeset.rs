//! The set of safe updates delivered by one run.

use crate::updates::{VersionDelta, format_deltas};
use chrono::Utc;
use uuid::Uuid;

/// Prefix shared by every update branch
pub const BRANCH_PREFIX: &str = "dependency-update";

/// Title used for both the commit subject and the review request
pub const UPDATE_TITLE: &str = "chore: update dependencies";

/// Safe updates travelling from commit to review request
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub branch_name: String,
    pub deltas: Vec<VersionDelta>,
    pub changelog: String,
}

impl ChangeSet {
    /// Start a change set on a freshly named branch
    pub fn new(deltas: Vec<VersionDelta>) -> Self {
        Self {
            branch_name: new_branch_name(),
            deltas,
            changelog: String::new(),
        }
    }

    /// One `pkg: current → target` line per delta
    pub fn summary(&self) -> String {
        format_deltas(&self.deltas)
    }

    pub fn commit_message(&self) -> String {
        format!(
            "{UPDATE_TITLE}\n\nUpdated dependencies:\n{}",
            self.summary()
        )
    }
}

/// Branch names carry the UTC time down to milliseconds (`YYYYMMDDhhmmssSSS`) plus a
/// random suffix, so runs never collide
pub fn new_branch_name() -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{BRANCH_PREFIX}-{stamp}-{}", &suffix[..8])
}
