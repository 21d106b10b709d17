use crate::log_debug;
use anyhow::{Result, anyhow};
use git2::Repository;

/// Results from a commit operation
#[derive(Debug, Clone)]
pub struct CommitResult {
    pub branch: String,
    pub commit_hash: String,
    pub files_changed: usize,
}

/// Commits the current index on HEAD.
///
/// Fails when the index matches the parent tree, so an update branch never
/// carries an empty commit.
pub fn commit(repo: &Repository, message: &str) -> Result<CommitResult> {
    let signature = repo.signature()?;
    let mut index = repo.index()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let parent_commit = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
        Err(e) => return Err(e.into()),
    };
    let parent_tree = parent_commit.as_ref().map(git2::Commit::tree).transpose()?;

    if parent_tree.as_ref().is_some_and(|t| t.id() == tree_id) {
        return Err(anyhow!("Nothing to commit: staged files are unchanged"));
    }

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    let files_changed = diff.deltas().len();

    let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
    let commit_oid = repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )?;

    let branch = repo.head()?.shorthand().unwrap_or("HEAD").to_string();
    let commit_hash = commit_oid.to_string()[..7].to_string();
    log_debug!(
        "Committed {} ({} files) on {}",
        commit_hash,
        files_changed,
        branch
    );

    Ok(CommitResult {
        branch,
        commit_hash,
        files_changed,
    })
}
