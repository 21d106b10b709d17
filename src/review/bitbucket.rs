use super::{ReviewRequest, ReviewRequestResult, ReviewRequester, endpoint_url, send_json};
use crate::error::Result;
use crate::log_debug;
use crate::platform::Platform;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Opens pull requests through the Bitbucket Cloud REST API
pub struct BitbucketRequester {
    client: Client,
    api_url: String,
    workspace: String,
    repo_slug: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct BranchRef<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct Endpoint<'a> {
    branch: BranchRef<'a>,
}

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    description: &'a str,
    source: Endpoint<'a>,
    destination: Endpoint<'a>,
}

#[derive(Deserialize)]
struct Link {
    href: String,
}

#[derive(Deserialize)]
struct Links {
    html: Link,
}

#[derive(Deserialize)]
struct PullRequestResponse {
    links: Links,
}

impl BitbucketRequester {
    pub fn new(
        client: Client,
        api_url: &str,
        workspace: &str,
        repo_slug: &str,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            workspace: workspace.to_string(),
            repo_slug: repo_slug.to_string(),
            token,
        }
    }

    fn pull_requests_url(&self) -> Result<Url> {
        endpoint_url(
            Platform::Bitbucket,
            &self.api_url,
            &["repositories", &self.workspace, &self.repo_slug, "pullrequests"],
        )
    }
}

#[async_trait]
impl ReviewRequester for BitbucketRequester {
    async fn create_review_request(&self, request: &ReviewRequest) -> Result<ReviewRequestResult> {
        let url = self.pull_requests_url()?;
        log_debug!("Creating Bitbucket pull request at {}", url);

        let mut builder = self.client.post(url).json(&CreatePullRequest {
            title: &request.title,
            description: &request.body,
            source: Endpoint {
                branch: BranchRef {
                    name: &request.source_branch,
                },
            },
            destination: Endpoint {
                branch: BranchRef {
                    name: &request.destination_branch,
                },
            },
        });
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let pull: PullRequestResponse = send_json(Platform::Bitbucket, builder).await?;
        Ok(ReviewRequestResult {
            url: pull.links.html.href,
        })
    }

    fn platform(&self) -> Platform {
        Platform::Bitbucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_and_slug_are_encoded() {
        let requester = BitbucketRequester::new(
            Client::new(),
            "https://api.bitbucket.org/2.0/",
            "my team",
            "widgets?x",
            None,
        );
        let url = requester.pull_requests_url().expect("valid API URL");
        assert_eq!(
            url.as_str(),
            "https://api.bitbucket.org/2.0/repositories/my%20team/widgets%3Fx/pullrequests"
        );
    }
}
