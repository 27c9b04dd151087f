//! GitHub API client for the repository operations the preview engine needs:
//! file contents at a ref, deployment records, and deployment statuses.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DeploymentRecord, DeploymentState, SourceControl};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// GitHub API client authenticated with an installation access token.
pub struct GitHubClient {
    access_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new GitHub client with an installation access token.
    pub fn new(access_token: String) -> Self {
        Self::with_api_base(access_token, GITHUB_API_BASE.to_string())
    }

    /// Create a client against a non-default API base URL.
    pub fn with_api_base(access_token: String, api_base: String) -> Self {
        Self {
            access_token,
            api_base,
            client: reqwest::Client::new(),
        }
    }

    /// Make an authenticated GET request to the GitHub API.
    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "previewr")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .context("Failed to make GitHub API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse GitHub API response")
    }

    /// Make an authenticated POST request to the GitHub API.
    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "previewr")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(body)
            .send()
            .await
            .context("Failed to make GitHub API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse GitHub API response")
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn get_file_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>> {
        let response: ContentsResponse = self
            .get(&format!(
                "/repos/{}/{}/contents/{}?ref={}",
                owner, repo, path, git_ref
            ))
            .await?;

        if response.encoding != "base64" {
            anyhow::bail!("unexpected content encoding: {}", response.encoding);
        }

        // The contents API wraps base64 at 60 columns.
        let compact: String = response.content.split_whitespace().collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .context("Failed to decode file contents")
    }

    async fn list_deployments(
        &self,
        owner: &str,
        repo: &str,
        environment: &str,
    ) -> Result<Vec<DeploymentRecord>> {
        self.get(&format!(
            "/repos/{}/{}/deployments?environment={}&per_page=100",
            owner, repo, environment
        ))
        .await
    }

    async fn create_deployment(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
        environment: &str,
        payload: Value,
    ) -> Result<DeploymentRecord> {
        let request_body = CreateDeploymentRequest {
            git_ref,
            auto_merge: false,
            environment,
            required_contexts: Vec::new(),
            payload,
        };

        self.post(&format!("/repos/{}/{}/deployments", owner, repo), &request_body)
            .await
    }

    async fn create_deployment_status(
        &self,
        owner: &str,
        repo: &str,
        deployment_id: i64,
        state: DeploymentState,
        environment_url: Option<&str>,
    ) -> Result<()> {
        let request_body = CreateDeploymentStatusRequest {
            state,
            environment_url: environment_url.map(str::to_string),
            auto_inactive: true,
        };

        let _: DeploymentStatusResponse = self
            .post(
                &format!(
                    "/repos/{}/{}/deployments/{}/statuses",
                    owner, repo, deployment_id
                ),
                &request_body,
            )
            .await?;
        Ok(())
    }
}

// Request/response types

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    encoding: String,
}

#[derive(Debug, Serialize)]
struct CreateDeploymentRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    auto_merge: bool,
    environment: &'a str,
    required_contexts: Vec<String>,
    payload: Value,
}

#[derive(Debug, Serialize)]
struct CreateDeploymentStatusRequest {
    state: DeploymentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment_url: Option<String>,
    auto_inactive: bool,
}

#[derive(Debug, Deserialize)]
struct DeploymentStatusResponse {
    #[allow(dead_code)]
    id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn decodes_wrapped_base64_file_contents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contents/.do/app.yaml"))
            .and(query_param("ref", "feature-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "bmFtZTogd2lk\nZ2V0cy1hcGk=\n",
                "encoding": "base64",
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::with_api_base("token".to_string(), server.uri());
        let bytes = client
            .get_file_contents("acme", "widgets", ".do/app.yaml", "feature-1")
            .await
            .unwrap();

        assert_eq!(bytes, b"name: widgets-api");
    }

    #[tokio::test]
    async fn rejects_unexpected_content_encoding() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contents/.do/app.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "name: widgets-api",
                "encoding": "utf-8",
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::with_api_base("token".to_string(), server.uri());
        let result = client
            .get_file_contents("acme", "widgets", ".do/app.yaml", "main")
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn lists_deployments_for_environment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/deployments"))
            .and(query_param("environment", "acme-widgets-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 7, "environment": "acme-widgets-42", "payload": { "app_id": "a-1" } },
                { "id": 12, "environment": "acme-widgets-42", "payload": { "app_id": "a-1" } },
            ])))
            .mount(&server)
            .await;

        let client = GitHubClient::with_api_base("token".to_string(), server.uri());
        let records = client
            .list_deployments("acme", "widgets", "acme-widgets-42")
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, 12);
        assert_eq!(records[1].payload["app_id"], "a-1");
    }

    #[tokio::test]
    async fn creates_deployment_with_environment_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/deployments"))
            .and(body_partial_json(json!({
                "ref": "feature-1",
                "auto_merge": false,
                "environment": "acme-widgets-42",
                "payload": { "app_id": "a-1" },
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 101,
                "environment": "acme-widgets-42",
                "payload": { "app_id": "a-1" },
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::with_api_base("token".to_string(), server.uri());
        let record = client
            .create_deployment(
                "acme",
                "widgets",
                "feature-1",
                "acme-widgets-42",
                json!({ "app_id": "a-1" }),
            )
            .await
            .unwrap();

        assert_eq!(record.id, 101);
    }

    #[tokio::test]
    async fn deployment_status_serializes_lowercase_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/deployments/101/statuses"))
            .and(body_partial_json(json!({
                "state": "error",
                "auto_inactive": true,
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 9000 })))
            .mount(&server)
            .await;

        let client = GitHubClient::with_api_base("token".to_string(), server.uri());
        client
            .create_deployment_status("acme", "widgets", 101, DeploymentState::Error, None)
            .await
            .unwrap();
    }
}
