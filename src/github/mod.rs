//! GitHub integration module for GitHub App support.
//!
//! This module provides:
//! - JWT generation and installation access token management
//! - A REST client for the repository operations the preview engine needs
//! - Webhook event payload models

pub mod api_client;
pub mod events;
pub mod token_manager;

pub use api_client::GitHubClient;
pub use events::PullRequestEvent;
pub use token_manager::AppClientFactory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A deployment record attached to a branch, used to surface preview-app
/// state on the pull request. The payload carries whatever the creator put
/// there; the engine stores the platform app id in it.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentRecord {
    pub id: i64,
    pub environment: String,
    #[serde(default)]
    pub payload: Value,
}

/// States a deployment status can be set to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Success,
    Error,
    Inactive,
}

/// Repository operations against GitHub, scoped to one app installation.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Fetch the raw contents of a file at a specific ref.
    async fn get_file_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>>;

    /// List deployment records for an environment.
    async fn list_deployments(
        &self,
        owner: &str,
        repo: &str,
        environment: &str,
    ) -> Result<Vec<DeploymentRecord>>;

    /// Create a deployment record on a ref, tagged with an environment.
    async fn create_deployment(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
        environment: &str,
        payload: Value,
    ) -> Result<DeploymentRecord>;

    /// Set the status of an existing deployment record.
    async fn create_deployment_status(
        &self,
        owner: &str,
        repo: &str,
        deployment_id: i64,
        state: DeploymentState,
        environment_url: Option<&str>,
    ) -> Result<()>;
}

/// Creates [`SourceControl`] clients bound to a specific installation.
///
/// Webhook events carry an installation id; every event is handled with a
/// client authenticated for that installation only.
#[async_trait]
pub trait SourceControlFactory: Send + Sync {
    async fn installation_client(&self, installation_id: i64) -> Result<Arc<dyn SourceControl>>;
}
