//! Update discovery through an external scanner process.

use crate::config::ScannerConfig;
use crate::error::{Result, UpdaterError};
use crate::manifest::PackageManager;
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Name of the scanner package installed before discovery
pub const SCANNER_PACKAGE: &str = "npm-check-updates";

/// Discovers available updates for a project
#[async_trait]
pub trait UpdateScanner: Send + Sync {
    /// Raw scanner output, or `None` when nothing is outdated
    async fn discover(&self, package_manager: PackageManager) -> Result<Option<String>>;
}

/// Runs `npm-check-updates` (through `npx` by default) in the working tree
pub struct NpmCheckUpdates {
    workdir: PathBuf,
    config: ScannerConfig,
}

impl NpmCheckUpdates {
    pub fn new(workdir: &Path, config: ScannerConfig) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            config,
        }
    }

    async fn install(&self, package_manager: PackageManager) -> Result<()> {
        let args = package_manager.global_install_args(SCANNER_PACKAGE);
        log_debug!("Installing {} with {}", SCANNER_PACKAGE, package_manager);
        run_command(package_manager.name(), &args, &self.workdir).await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateScanner for NpmCheckUpdates {
    async fn discover(&self, package_manager: PackageManager) -> Result<Option<String>> {
        if self.config.install_globally {
            // A failed install is not fatal when the scanner is already reachable via npx
            if let Err(e) = self.install(package_manager).await {
                log_warn!("Could not install {}: {}", SCANNER_PACKAGE, e);
            }
        }

        let stdout = run_command(&self.config.command, &self.config.args, &self.workdir).await?;
        if stdout.trim().is_empty() {
            log_info!("No updates available.");
            return Ok(None);
        }
        Ok(Some(stdout))
    }
}

/// Run a program to completion, returning stdout or a discovery error carrying stderr
pub async fn run_command(program: &str, args: &[String], dir: &Path) -> Result<String> {
    log_debug!("Running {} {:?} in {}", program, args, dir.display());
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| UpdaterError::Discovery(format!("Failed to execute {program}: {e}")))?;

    if !output.status.success() {
        return Err(UpdaterError::Discovery(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
