//! App Platform API client.
//!
//! Talks to the platform's `/v2/apps` surface with a bearer token. Responses
//! arrive wrapped in a resource envelope (`{"app": ...}`, `{"deployment":
//! ...}`), which this client unwraps.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{App, AppPlatform, Deployment};
use crate::spec::AppSpec;

pub struct PlatformClient {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl PlatformClient {
    pub fn new(token: String, api_base: String) -> Self {
        Self {
            token,
            api_base,
            client: reqwest::Client::new(),
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "previewr")
            .send()
            .await
            .context("Failed to make platform API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Platform API error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse platform API response")
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "previewr")
            .json(body)
            .send()
            .await
            .context("Failed to make platform API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Platform API error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse platform API response")
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "previewr")
            .send()
            .await
            .context("Failed to make platform API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Platform API error: {} - {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl AppPlatform for PlatformClient {
    async fn create_app(&self, spec: &AppSpec) -> Result<App> {
        let response: AppResponse = self
            .post("/v2/apps", &CreateAppRequest { spec })
            .await?;
        Ok(response.app)
    }

    async fn create_deployment(&self, app_id: &str) -> Result<Deployment> {
        let response: DeploymentResponse = self
            .post(
                &format!("/v2/apps/{}/deployments", app_id),
                &serde_json::json!({}),
            )
            .await?;
        Ok(response.deployment)
    }

    async fn get_deployment(&self, app_id: &str, deployment_id: &str) -> Result<Deployment> {
        let response: DeploymentResponse = self
            .get(&format!("/v2/apps/{}/deployments/{}", app_id, deployment_id))
            .await?;
        Ok(response.deployment)
    }

    async fn get_app(&self, app_id: &str) -> Result<App> {
        let response: AppResponse = self.get(&format!("/v2/apps/{}", app_id)).await?;
        Ok(response.app)
    }

    async fn delete_app(&self, app_id: &str) -> Result<()> {
        self.delete(&format!("/v2/apps/{}", app_id)).await
    }
}

// Request/response envelopes

#[derive(Debug, Serialize)]
struct CreateAppRequest<'a> {
    spec: &'a AppSpec,
}

#[derive(Debug, Deserialize)]
struct AppResponse {
    app: App,
}

#[derive(Debug, Deserialize)]
struct DeploymentResponse {
    deployment: Deployment,
}
