use crate::log_debug;
use crate::updates::{ClassifyPolicy, ZeroMajorPolicy};

use anyhow::{Context, Result, anyhow};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Project configuration filename, looked up in the working tree root
pub const PROJECT_CONFIG_FILENAME: &str = ".depupdater.toml";

/// Configuration for one process; each pipeline run reads it but never mutates it
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub gitlab: GitLabConfig,
    pub bitbucket: BitbucketConfig,
    pub notification: NotificationConfig,
    pub scanner: ScannerConfig,
    pub changelog: ChangelogConfig,
    pub policy: PolicyConfig,
    /// Remote that update branches are pushed to
    pub remote: RemoteName,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GitHubConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub base_branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            base_branch: default_base_branch(),
            token: None,
            api_url: "https://api.github.com".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GitLabConfig {
    /// Numeric id or `group/project` path
    pub project_id: Option<String>,
    pub base_branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub api_url: String,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            base_branch: default_base_branch(),
            token: None,
            api_url: "https://gitlab.com/api/v4".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BitbucketConfig {
    pub workspace: Option<String>,
    pub repo_slug: Option<String>,
    pub base_branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub api_url: String,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            repo_slug: None,
            base_branch: default_base_branch(),
            token: None,
            api_url: "https://api.bitbucket.org/2.0".to_string(),
        }
    }
}

/// Outgoing mail settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Sender address, defaults to `username`
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            username: None,
            password: None,
            from: None,
            to: None,
        }
    }
}

impl NotificationConfig {
    /// Whether enough is configured to deliver mail
    pub fn is_complete(&self) -> bool {
        self.username.is_some() && self.password.is_some() && self.to.is_some()
    }

    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref().or(self.username.as_deref())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScannerConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Install the scanner globally with the detected package manager first
    pub install_globally: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec![
                "npm-check-updates".to_string(),
                "-u".to_string(),
                "--pre".to_string(),
            ],
            install_globally: true,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ChangelogConfig {
    pub command: String,
    pub preset: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            preset: "angular".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    pub zero_major: ZeroMajorPolicy,
    /// Drop deltas whose target equals the current version
    pub drop_noop: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            zero_major: ZeroMajorPolicy::default(),
            drop_noop: true,
        }
    }
}

impl PolicyConfig {
    pub fn classify_policy(&self) -> ClassifyPolicy {
        ClassifyPolicy {
            zero_major: self.zero_major,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct RemoteName(pub String);

impl Default for RemoteName {
    fn default() -> Self {
        Self("origin".to_string())
    }
}

impl AsRef<str> for RemoteName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn default_base_branch() -> String {
    "main".to_string()
}

impl Config {
    /// Load personal config, then the project file in `workdir`, then `.env` and the environment
    pub fn load(workdir: &Path) -> Result<Self> {
        let mut config = match Self::get_config_path() {
            Some(path) if path.exists() => Self::load_file(&path)?,
            _ => Self::default(),
        };

        let project_path = workdir.join(PROJECT_CONFIG_FILENAME);
        if project_path.exists() {
            let project_config = Self::load_file(&project_path)?;
            config.merge_with_project_config(project_config);
        }

        if let Err(e) = dotenv::from_path(workdir.join(".env")) {
            log_debug!("No .env loaded: {}", e);
        }
        config.apply_env_overrides(|key| std::env::var(key).ok());

        log_debug!("Configuration loaded for {}", workdir.display());
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).map_err(|e| {
            anyhow!(
                "Invalid configuration file format: {}. Please check {} for syntax errors.",
                e,
                path.display()
            )
        })
    }

    /// Project settings take precedence, except secrets which only come from the
    /// personal file or the environment
    pub fn merge_with_project_config(&mut self, project: Self) {
        log_debug!("Merging with project configuration");
        let defaults = Self::default();

        merge_option(&mut self.github.owner, project.github.owner);
        merge_option(&mut self.github.repo, project.github.repo);
        merge_value(
            &mut self.github.base_branch,
            project.github.base_branch,
            &defaults.github.base_branch,
        );
        merge_value(
            &mut self.github.api_url,
            project.github.api_url,
            &defaults.github.api_url,
        );

        merge_option(&mut self.gitlab.project_id, project.gitlab.project_id);
        merge_value(
            &mut self.gitlab.base_branch,
            project.gitlab.base_branch,
            &defaults.gitlab.base_branch,
        );
        merge_value(
            &mut self.gitlab.api_url,
            project.gitlab.api_url,
            &defaults.gitlab.api_url,
        );

        merge_option(&mut self.bitbucket.workspace, project.bitbucket.workspace);
        merge_option(&mut self.bitbucket.repo_slug, project.bitbucket.repo_slug);
        merge_value(
            &mut self.bitbucket.base_branch,
            project.bitbucket.base_branch,
            &defaults.bitbucket.base_branch,
        );
        merge_value(
            &mut self.bitbucket.api_url,
            project.bitbucket.api_url,
            &defaults.bitbucket.api_url,
        );

        merge_option(&mut self.notification.to, project.notification.to);
        merge_option(&mut self.notification.from, project.notification.from);

        if project.scanner != defaults.scanner {
            self.scanner = project.scanner;
        }
        if project.changelog != defaults.changelog {
            self.changelog = project.changelog;
        }
        if project.policy != defaults.policy {
            self.policy = project.policy;
        }
        if project.remote != defaults.remote {
            self.remote = project.remote;
        }
    }

    /// Overlay values from environment variables, using the names the tool has always read
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        override_option(&mut self.github.owner, get("GITHUB_OWNER"));
        override_option(&mut self.github.repo, get("GITHUB_REPO"));
        override_option(&mut self.github.token, get("GITHUB_TOKEN"));
        if let Some(branch) = get("GITHUB_BASE_BRANCH") {
            self.github.base_branch = branch;
        }

        override_option(&mut self.gitlab.project_id, get("GITLAB_PROJECT_ID"));
        override_option(&mut self.gitlab.token, get("GITLAB_TOKEN"));
        if let Some(branch) = get("GITLAB_BASE_BRANCH") {
            self.gitlab.base_branch = branch;
        }

        override_option(&mut self.bitbucket.workspace, get("BITBUCKET_WORKSPACE"));
        override_option(&mut self.bitbucket.repo_slug, get("BITBUCKET_REPO_SLUG"));
        override_option(&mut self.bitbucket.token, get("BITBUCKET_TOKEN"));
        if let Some(branch) = get("BITBUCKET_BASE_BRANCH") {
            self.bitbucket.base_branch = branch;
        }

        override_option(&mut self.notification.username, get("EMAIL_USER"));
        override_option(&mut self.notification.password, get("EMAIL_PASS"));
        override_option(&mut self.notification.to, get("NOTIFICATION_EMAIL"));
        if let Some(host) = get("SMTP_HOST") {
            self.notification.smtp_host = host;
        }
        if let Some(port) = get("SMTP_PORT") {
            match port.parse() {
                Ok(port) => self.notification.smtp_port = port,
                Err(_) => log_debug!("Ignoring invalid SMTP_PORT value: {}", port),
            }
        }
    }

    /// Path to the personal configuration file
    fn get_config_path() -> Option<PathBuf> {
        let mut path = config_dir()?;
        path.push("dep-updater");
        path.push("config.toml");
        Some(path)
    }
}

fn merge_option(target: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *target = value;
    }
}

fn merge_value(target: &mut String, value: String, default: &str) {
    if value != default {
        *target = value;
    }
}

fn override_option(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *target = Some(value);
    }
}
