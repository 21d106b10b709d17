//! Review requests (pull requests / merge requests) on code-hosting platforms.

mod bitbucket;
mod github;
mod gitlab;

pub use bitbucket::BitbucketRequester;
pub use github::GitHubRequester;
pub use gitlab::GitLabRequester;

use crate::changeset::{ChangeSet, UPDATE_TITLE};
use crate::error::{Result, UpdaterError};
use crate::platform::{Platform, PlatformTarget};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

/// User agent sent with every platform API call
pub const USER_AGENT: &str = concat!("dep-updater/", env!("CARGO_PKG_VERSION"));

/// A review request ready to be opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub source_branch: String,
    pub destination_branch: String,
    pub title: String,
    pub body: String,
}

impl ReviewRequest {
    /// Describe `change_set` for the platform `target` lives on
    pub fn for_change_set(change_set: &ChangeSet, target: &PlatformTarget) -> Self {
        Self {
            source_branch: change_set.branch_name.clone(),
            destination_branch: target.base_branch().to_string(),
            title: UPDATE_TITLE.to_string(),
            body: review_body(target.platform(), &change_set.summary(), &change_set.changelog),
        }
    }
}

/// Body text listing the updated dependencies and their changelogs
pub fn review_body(platform: Platform, summary: &str, changelog: &str) -> String {
    let kind = match platform {
        Platform::GitLab => "MR",
        Platform::GitHub | Platform::Bitbucket => "PR",
    };
    format!(
        "This {kind} updates dependencies.\n\n**Updated Dependencies:**\n{summary}\n\n**Changelogs:**\n{changelog}"
    )
}

/// An opened review request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequestResult {
    pub url: String,
}

/// Opens review requests on one platform
#[async_trait]
pub trait ReviewRequester: Send + Sync {
    async fn create_review_request(&self, request: &ReviewRequest) -> Result<ReviewRequestResult>;

    fn platform(&self) -> Platform;
}

/// Build the requester for a validated target
pub fn requester_for(target: &PlatformTarget, client: Client) -> Box<dyn ReviewRequester> {
    match target {
        PlatformTarget::GitHub {
            owner,
            repo,
            token,
            api_url,
            ..
        } => Box::new(GitHubRequester::new(
            client,
            api_url,
            owner,
            repo,
            token.clone(),
        )),
        PlatformTarget::GitLab {
            project_id,
            token,
            api_url,
            ..
        } => Box::new(GitLabRequester::new(
            client,
            api_url,
            project_id,
            token.clone(),
        )),
        PlatformTarget::Bitbucket {
            workspace,
            repo_slug,
            token,
            api_url,
            ..
        } => Box::new(BitbucketRequester::new(
            client,
            api_url,
            workspace,
            repo_slug,
            token.clone(),
        )),
    }
}

/// Shared HTTP client for platform calls
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| UpdaterError::Review(format!("Failed to build HTTP client: {e}")))
}

/// Send a request and decode a JSON response, turning non-2xx statuses into errors
pub(crate) async fn send_json<T: DeserializeOwned>(
    platform: Platform,
    request: RequestBuilder,
) -> Result<T> {
    let response = request.send().await.map_err(|e| {
        UpdaterError::Review(format!("{} request failed: {e}", platform.display_name()))
    })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(UpdaterError::Review(format!(
            "{} API returned {status}: {}",
            platform.display_name(),
            text.trim()
        )));
    }

    response.json::<T>().await.map_err(|e| {
        UpdaterError::Review(format!(
            "Unexpected {} API response: {e}",
            platform.display_name()
        ))
    })
}

/// Endpoint under `base`, each segment percent-encoded on its own
pub(crate) fn endpoint_url(platform: Platform, base: &str, segments: &[&str]) -> Result<Url> {
    let invalid =
        || UpdaterError::Config(format!("Invalid {} API URL: {base}", platform.display_name()));
    let mut url = Url::parse(base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::updates::VersionDelta;
    use semver::Version;

    #[test]
    fn test_review_body_wording_per_platform() {
        let body = review_body(Platform::GitLab, "a: 1.0.0 → 1.1.0", "\n### a\nfixes\n");
        assert!(body.starts_with("This MR updates dependencies."));
        assert!(body.contains("**Updated Dependencies:**\na: 1.0.0 → 1.1.0"));
        assert!(body.ends_with("**Changelogs:**\n\n### a\nfixes\n"));

        let body = review_body(Platform::Bitbucket, "", "");
        assert!(body.starts_with("This PR updates dependencies."));
    }

    #[test]
    fn test_review_request_targets_base_branch_and_pushed_branch() {
        let mut config = Config::default();
        config.github.owner = Some("octo".to_string());
        config.github.repo = Some("widgets".to_string());
        config.github.base_branch = "trunk".to_string();
        let target =
            PlatformTarget::from_config(Platform::GitHub, &config).expect("config is complete");

        let delta = VersionDelta::new("a", Version::new(1, 0, 0), Version::new(1, 1, 0))
            .expect("valid delta");
        let change_set = ChangeSet::new(vec![delta]);
        let request = ReviewRequest::for_change_set(&change_set, &target);

        assert_eq!(request.source_branch, change_set.branch_name);
        assert_eq!(request.destination_branch, "trunk");
        assert_eq!(request.title, "chore: update dependencies");
    }

    #[test]
    fn test_endpoint_url_encodes_each_segment() {
        let url = endpoint_url(
            Platform::GitHub,
            "https://api.github.com/",
            &["repos", "octo org", "a/b", "pulls"],
        )
        .expect("valid API URL");
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo%20org/a%2Fb/pulls"
        );

        let url = endpoint_url(Platform::GitLab, "https://gitlab.com/api/v4", &["projects"])
            .expect("valid API URL");
        assert_eq!(url.as_str(), "https://gitlab.com/api/v4/projects");
    }

    #[test]
    fn test_endpoint_url_rejects_unusable_base() {
        let err = endpoint_url(Platform::Bitbucket, "not a url", &["repositories"])
            .expect_err("relative base is rejected");
        assert_eq!(err.to_string(), "Invalid Bitbucket API URL: not a url");
    }
}
