// Git module providing the version-control operations the updater needs

mod commit;
mod repository;
mod utils;

pub use commit::CommitResult;
pub use repository::GitRepo;
pub use utils::*;

use anyhow::Result;

/// Version-control operations used to deliver an update branch
pub trait VersionControl: Send + Sync {
    /// Create `branch` at HEAD and switch to it
    fn create_branch(&self, branch: &str) -> Result<()>;

    /// Stage exactly `paths`, relative to the work tree root
    fn stage(&self, paths: &[&str]) -> Result<()>;

    fn commit(&self, message: &str) -> Result<CommitResult>;

    fn push(&self, remote: &str, branch: &str) -> Result<()>;
}
