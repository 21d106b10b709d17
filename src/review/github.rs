use super::{ReviewRequest, ReviewRequestResult, ReviewRequester, endpoint_url, send_json};
use crate::error::Result;
use crate::log_debug;
use crate::platform::Platform;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Opens pull requests through the GitHub REST API
pub struct GitHubRequester {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct CreatePull<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct PullResponse {
    html_url: String,
}

impl GitHubRequester {
    pub fn new(
        client: Client,
        api_url: &str,
        owner: &str,
        repo: &str,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
        }
    }

    fn pulls_url(&self) -> Result<Url> {
        endpoint_url(
            Platform::GitHub,
            &self.api_url,
            &["repos", &self.owner, &self.repo, "pulls"],
        )
    }
}

#[async_trait]
impl ReviewRequester for GitHubRequester {
    async fn create_review_request(&self, request: &ReviewRequest) -> Result<ReviewRequestResult> {
        let url = self.pulls_url()?;
        log_debug!("Creating GitHub pull request at {}", url);

        let mut builder = self
            .client
            .post(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&CreatePull {
                title: &request.title,
                head: &request.source_branch,
                base: &request.destination_branch,
                body: &request.body,
            });
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let pull: PullResponse = send_json(Platform::GitHub, builder).await?;
        Ok(ReviewRequestResult { url: pull.html_url })
    }

    fn platform(&self) -> Platform {
        Platform::GitHub
    }
}
