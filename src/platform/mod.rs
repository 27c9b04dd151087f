//! Abstraction over the app-hosting platform.
//!
//! The engine only ever needs five operations: create an app from a spec,
//! kick a deployment, read deployment and app state, and delete an app.

pub mod api_client;

pub use api_client::PlatformClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::spec::AppSpec;

/// A hosted application.
#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub id: String,
    /// Public URL of the app; empty until the first deployment goes live
    #[serde(default)]
    pub live_url: String,
}

/// One attempt to materialize an app's spec.
#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    pub id: String,
    #[serde(default)]
    pub phase: DeploymentPhase,
}

/// Deployment phases reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentPhase {
    PendingBuild,
    Building,
    PendingDeploy,
    Deploying,
    Active,
    Superseded,
    Error,
    Canceled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DeploymentPhase {
    /// Whether the deployment will make no further progress on its own.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Active | Self::Superseded | Self::Error | Self::Canceled
        )
    }
}

#[async_trait]
pub trait AppPlatform: Send + Sync {
    async fn create_app(&self, spec: &AppSpec) -> Result<App>;
    async fn create_deployment(&self, app_id: &str) -> Result<Deployment>;
    async fn get_deployment(&self, app_id: &str, deployment_id: &str) -> Result<Deployment>;
    async fn get_app(&self, app_id: &str) -> Result<App>;
    async fn delete_app(&self, app_id: &str) -> Result<()>;
}
