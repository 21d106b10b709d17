use super::{ReviewRequest, ReviewRequestResult, ReviewRequester, endpoint_url, send_json};
use crate::error::Result;
use crate::log_debug;
use crate::platform::Platform;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Opens merge requests through the GitLab REST API
pub struct GitLabRequester {
    client: Client,
    api_url: String,
    project_id: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct CreateMergeRequest<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct MergeRequestResponse {
    web_url: String,
}

impl GitLabRequester {
    pub fn new(client: Client, api_url: &str, project_id: &str, token: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            project_id: project_id.to_string(),
            token,
        }
    }

    /// Project paths such as `group/project` must be URL-encoded as a single segment
    fn merge_requests_url(&self) -> Result<Url> {
        endpoint_url(
            Platform::GitLab,
            &self.api_url,
            &["projects", &self.project_id, "merge_requests"],
        )
    }
}

#[async_trait]
impl ReviewRequester for GitLabRequester {
    async fn create_review_request(&self, request: &ReviewRequest) -> Result<ReviewRequestResult> {
        let url = self.merge_requests_url()?;
        log_debug!("Creating GitLab merge request at {}", url);

        let mut builder = self.client.post(url).json(&CreateMergeRequest {
            source_branch: &request.source_branch,
            target_branch: &request.destination_branch,
            title: &request.title,
            description: &request.body,
        });
        if let Some(token) = &self.token {
            builder = builder.header("PRIVATE-TOKEN", token);
        }

        let merge_request: MergeRequestResponse = send_json(Platform::GitLab, builder).await?;
        Ok(ReviewRequestResult {
            url: merge_request.web_url,
        })
    }

    fn platform(&self) -> Platform {
        Platform::GitLab
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_path_is_encoded() {
        let requester = GitLabRequester::new(
            Client::new(),
            "https://gitlab.example.com/api/v4",
            "group/sub project",
            None,
        );
        let url = requester.merge_requests_url().expect("valid API URL");
        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/projects/group%2Fsub%20project/merge_requests"
        );
    }
}
