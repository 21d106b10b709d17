//! Best-effort changelog text for updated packages.

use crate::config::ChangelogConfig;
use crate::error::Result;
use crate::scanner::run_command;
use crate::updates::VersionDelta;
use crate::{log_debug, log_warn};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Text used when no changelog could be produced for a package
pub const CHANGELOG_PLACEHOLDER: &str = "Changelog not found.";

/// Produces changelog text for one package update
#[async_trait]
pub trait ChangelogSource: Send + Sync {
    async fn changelog(&self, delta: &VersionDelta) -> Result<String>;
}

/// Runs `conventional-changelog` for each package
pub struct ConventionalChangelog {
    workdir: PathBuf,
    config: ChangelogConfig,
}

impl ConventionalChangelog {
    pub fn new(workdir: &Path, config: ChangelogConfig) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            config,
        }
    }

    fn args(&self, delta: &VersionDelta) -> Vec<String> {
        vec![
            "conventional-changelog".to_string(),
            "-p".to_string(),
            self.config.preset.clone(),
            "--pkg".to_string(),
            delta.package_name().to_string(),
            "--from".to_string(),
            delta.current_version().to_string(),
            "--to".to_string(),
            delta.target_version().to_string(),
        ]
    }
}

#[async_trait]
impl ChangelogSource for ConventionalChangelog {
    async fn changelog(&self, delta: &VersionDelta) -> Result<String> {
        run_command(&self.config.command, &self.args(delta), &self.workdir).await
    }
}

/// Changelog block for one package, never failing
pub async fn resolve(source: &dyn ChangelogSource, delta: &VersionDelta) -> String {
    let text = match source.changelog(delta).await {
        Ok(text) if !text.trim().is_empty() => text.trim_end().to_string(),
        Ok(_) => {
            log_debug!("Empty changelog for {}", delta.package_name());
            CHANGELOG_PLACEHOLDER.to_string()
        }
        Err(e) => {
            log_warn!("Changelog unavailable for {}: {}", delta.package_name(), e);
            CHANGELOG_PLACEHOLDER.to_string()
        }
    };
    format!("\n### {}\n{}\n", delta.package_name(), text)
}

/// Concatenated changelog blocks, in input order
pub async fn resolve_all(source: &dyn ChangelogSource, deltas: &[VersionDelta]) -> String {
    let mut changelogs = String::new();
    for delta in deltas {
        changelogs.push_str(&resolve(source, delta).await);
    }
    changelogs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpdaterError;
    use semver::Version;

    struct FlakySource;

    #[async_trait]
    impl ChangelogSource for FlakySource {
        async fn changelog(&self, delta: &VersionDelta) -> Result<String> {
            match delta.package_name() {
                "broken" => Err(UpdaterError::Discovery("tool missing".to_string())),
                "quiet" => Ok("  \n".to_string()),
                name => Ok(format!("* {name} fixes\n")),
            }
        }
    }

    fn delta(name: &str) -> VersionDelta {
        VersionDelta::new(name, Version::new(1, 0, 0), Version::new(1, 1, 0)).expect("valid delta")
    }

    #[tokio::test]
    async fn test_failures_become_placeholders_and_order_is_kept() {
        let deltas = vec![delta("first"), delta("broken"), delta("quiet"), delta("last")];
        let text = resolve_all(&FlakySource, &deltas).await;

        assert_eq!(
            text,
            "\n### first\n* first fixes\n\
             \n### broken\nChangelog not found.\n\
             \n### quiet\nChangelog not found.\n\
             \n### last\n* last fixes\n"
        );
    }

    #[test]
    fn test_conventional_changelog_args() {
        let source = ConventionalChangelog::new(Path::new("."), ChangelogConfig::default());
        let args = source.args(&delta("left-pad"));
        assert_eq!(
            args,
            vec![
                "conventional-changelog",
                "-p",
                "angular",
                "--pkg",
                "left-pad",
                "--from",
                "1.0.0",
                "--to",
                "1.1.0"
            ]
        );
    }
}
