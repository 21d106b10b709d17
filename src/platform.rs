//! Code-hosting platforms a review request can be opened on.
//!
//! The selector is parsed once per process; the target carrying the identifiers of the
//! remote repository is validated once per run from configuration.

use crate::config::Config;
use crate::error::UpdaterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported code-hosting platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    GitHub,
    GitLab,
    Bitbucket,
}

impl Platform {
    pub const ALL: &'static [Platform] = &[Platform::GitHub, Platform::GitLab, Platform::Bitbucket];

    /// Name as used on the command line
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Bitbucket => "bitbucket",
        }
    }

    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::GitHub => "GitHub",
            Self::GitLab => "GitLab",
            Self::Bitbucket => "Bitbucket",
        }
    }

    pub fn all_names() -> Vec<&'static str> {
        Self::ALL.iter().map(Self::name).collect()
    }
}

impl FromStr for Platform {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.name() == lower)
            .copied()
            .ok_or_else(|| UpdaterError::UnsupportedPlatform(s.to_string()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A remote repository on one platform, with everything needed to address it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformTarget {
    GitHub {
        owner: String,
        repo: String,
        base_branch: String,
        token: Option<String>,
        api_url: String,
    },
    GitLab {
        project_id: String,
        base_branch: String,
        token: Option<String>,
        api_url: String,
    },
    Bitbucket {
        workspace: String,
        repo_slug: String,
        base_branch: String,
        token: Option<String>,
        api_url: String,
    },
}

impl PlatformTarget {
    /// Validate that `config` carries the identifiers `platform` requires
    pub fn from_config(platform: Platform, config: &Config) -> Result<Self, UpdaterError> {
        match platform {
            Platform::GitHub => {
                let gh = &config.github;
                match (present(gh.owner.as_deref()), present(gh.repo.as_deref())) {
                    (Some(owner), Some(repo)) => Ok(Self::GitHub {
                        owner: owner.to_string(),
                        repo: repo.to_string(),
                        base_branch: gh.base_branch.clone(),
                        token: gh.token.clone(),
                        api_url: gh.api_url.clone(),
                    }),
                    _ => Err(UpdaterError::Config(
                        "GITHUB_OWNER and GITHUB_REPO must be set for GitHub platform.".to_string(),
                    )),
                }
            }
            Platform::GitLab => {
                let gl = &config.gitlab;
                let Some(project_id) = present(gl.project_id.as_deref()) else {
                    return Err(UpdaterError::Config(
                        "GITLAB_PROJECT_ID must be set for GitLab platform.".to_string(),
                    ));
                };
                Ok(Self::GitLab {
                    project_id: project_id.to_string(),
                    base_branch: gl.base_branch.clone(),
                    token: gl.token.clone(),
                    api_url: gl.api_url.clone(),
                })
            }
            Platform::Bitbucket => {
                let bb = &config.bitbucket;
                match (
                    present(bb.workspace.as_deref()),
                    present(bb.repo_slug.as_deref()),
                ) {
                    (Some(workspace), Some(repo_slug)) => Ok(Self::Bitbucket {
                        workspace: workspace.to_string(),
                        repo_slug: repo_slug.to_string(),
                        base_branch: bb.base_branch.clone(),
                        token: bb.token.clone(),
                        api_url: bb.api_url.clone(),
                    }),
                    _ => Err(UpdaterError::Config(
                        "BITBUCKET_WORKSPACE and BITBUCKET_REPO_SLUG must be set for Bitbucket platform."
                            .to_string(),
                    )),
                }
            }
        }
    }

    /// Parse the selector and validate configuration in one step
    pub fn resolve(selector: &str, config: &Config) -> Result<Self, UpdaterError> {
        let platform: Platform = selector.parse()?;
        Self::from_config(platform, config)
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::GitHub { .. } => Platform::GitHub,
            Self::GitLab { .. } => Platform::GitLab,
            Self::Bitbucket { .. } => Platform::Bitbucket,
        }
    }

    pub fn base_branch(&self) -> &str {
        match self {
            Self::GitHub { base_branch, .. }
            | Self::GitLab { base_branch, .. }
            | Self::Bitbucket { base_branch, .. } => base_branch,
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
