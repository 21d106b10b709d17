use crate::git::VersionControl;
use crate::git::commit::{self, CommitResult};
use crate::git::utils::run_git_command;
use crate::{log_debug, log_warn};
use anyhow::{Context as AnyhowContext, Result, anyhow};
use git2::Repository;
use std::path::{Path, PathBuf};

/// Represents a Git repository and provides methods for interacting with it.
#[derive(Debug, Clone)]
pub struct GitRepo {
    repo_path: PathBuf,
}

impl GitRepo {
    /// Creates a new `GitRepo` for the work tree containing `repo_path`.
    pub fn new(repo_path: &Path) -> Result<Self> {
        let repo = Repository::discover(repo_path)
            .with_context(|| format!("No Git repository found at {}", repo_path.display()))?;
        let workdir = repo
            .workdir()
            .context("Repository has no working directory")?
            .to_path_buf();
        Ok(Self { repo_path: workdir })
    }

    /// Open the repository at the stored path
    pub fn open_repo(&self) -> Result<Repository, git2::Error> {
        Repository::open(&self.repo_path)
    }

    /// Returns the work tree root
    pub fn repo_path(&self) -> &PathBuf {
        &self.repo_path
    }

    /// Retrieves the current branch name.
    pub fn get_current_branch(&self) -> Result<String> {
        let repo = self.open_repo()?;
        let head = repo.head()?;
        let branch_name = head.shorthand().unwrap_or("HEAD detached").to_string();
        log_debug!("Current branch: {}", branch_name);
        Ok(branch_name)
    }

    /// Creates a local branch at HEAD and checks it out, keeping work tree changes.
    pub fn checkout_new_branch(&self, branch_name: &str) -> Result<()> {
        let repo = self.open_repo()?;
        let head_commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .context("Cannot branch from a repository without commits")?;

        let branch = repo
            .branch(branch_name, &head_commit, false)
            .with_context(|| format!("Failed to create branch {branch_name}"))?;
        let refname = branch
            .get()
            .name()
            .ok_or_else(|| anyhow!("Branch name is not valid UTF-8"))?
            .to_string();

        // The new branch points at HEAD's commit, so the index and work tree stay as they are
        repo.set_head(&refname)?;
        log_debug!("Switched to new branch {}", branch_name);
        Ok(())
    }

    /// Stages the given paths. Missing files are skipped with a warning, but at least
    /// one path must exist.
    pub fn stage_paths(&self, paths: &[&str]) -> Result<usize> {
        let repo = self.open_repo()?;
        let mut index = repo.index()?;
        let mut staged = 0;

        for path in paths {
            if self.repo_path.join(path).exists() {
                index
                    .add_path(Path::new(path))
                    .with_context(|| format!("Failed to stage {path}"))?;
                staged += 1;
            } else {
                log_warn!("Not staging {}: file does not exist", path);
            }
        }

        if staged == 0 {
            return Err(anyhow!("None of the files to stage exist: {}", paths.join(", ")));
        }

        index.write()?;
        log_debug!("Staged {} file(s)", staged);
        Ok(staged)
    }

    /// Commits the staged changes on the current branch.
    pub fn commit(&self, message: &str) -> Result<CommitResult> {
        let repo = self.open_repo()?;
        commit::commit(&repo, message)
    }

    /// Pushes `branch` to `remote` through the git CLI so credential helpers apply.
    pub fn push_branch(&self, remote: &str, branch: &str) -> Result<()> {
        log_debug!("Pushing {} to {}", branch, remote);
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        run_git_command(&self.repo_path, &["push", remote, &refspec])?;
        Ok(())
    }
}

impl VersionControl for GitRepo {
    fn create_branch(&self, branch: &str) -> Result<()> {
        self.checkout_new_branch(branch)
    }

    fn stage(&self, paths: &[&str]) -> Result<()> {
        self.stage_paths(paths).map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<CommitResult> {
        GitRepo::commit(self, message)
    }

    fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.push_branch(remote, branch)
    }
}
