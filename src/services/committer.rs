//! Change committer
//!
//! Delivers a change set to the remote: new branch, staged manifest and lockfile,
//! commit, push. Each step aborts the rest on failure and nothing is rolled back.

use crate::changeset::ChangeSet;
use crate::error::{Result, UpdaterError};
use crate::git::VersionControl;
use crate::manifest::PackageManager;
use crate::log_debug;

/// Service for committing and pushing dependency updates
pub struct ChangeCommitter<'a> {
    vcs: &'a dyn VersionControl,
    remote: &'a str,
}

impl<'a> ChangeCommitter<'a> {
    pub fn new(vcs: &'a dyn VersionControl, remote: &'a str) -> Self {
        Self { vcs, remote }
    }

    /// Commit and push `change_set`, returning the pushed branch name
    ///
    /// A push failure leaves the local branch and commit in place; it is reported as
    /// `UpdaterError::Push`.
    pub fn deliver(&self, change_set: &ChangeSet, package_manager: PackageManager) -> Result<String> {
        let branch = change_set.branch_name.as_str();

        log_debug!("Creating branch {}", branch);
        self.vcs
            .create_branch(branch)
            .map_err(|e| UpdaterError::Git(format!("{e:#}")))?;

        let files = package_manager.tracked_files();
        log_debug!("Staging {:?}", files);
        self.vcs
            .stage(&files)
            .map_err(|e| UpdaterError::Git(format!("{e:#}")))?;

        let result = self
            .vcs
            .commit(&change_set.commit_message())
            .map_err(|e| UpdaterError::Git(format!("{e:#}")))?;
        log_debug!("Created commit {} on {}", result.commit_hash, result.branch);

        self.vcs
            .push(self.remote, branch)
            .map_err(|e| UpdaterError::Push(format!("{e:#}")))?;
        log_debug!("Pushed {} to {}", branch, self.remote);

        Ok(branch.to_string())
    }
}
