use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

use crate::log_debug;

/// Executes a git command in `dir` and returns its trimmed stdout
///
/// Used for operations that should go through the user's git setup, such as
/// pushing with configured credential helpers.
pub fn run_git_command(dir: &Path, args: &[&str]) -> Result<String> {
    log_debug!("Running git {:?} in {}", args, dir.display());
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .context("Failed to execute git command")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "Git command failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let stdout =
        String::from_utf8(output.stdout).context("Invalid UTF-8 output from git command")?;

    Ok(stdout.trim().to_string())
}
