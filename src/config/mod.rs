use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub platform: PlatformConfig,
    #[serde(default)]
    pub previews: PreviewConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// Numeric GitHub App ID
    pub app_id: i64,
    /// Path to the app's RSA private key in PEM format
    pub private_key_path: PathBuf,
    /// Secret for verifying webhook signatures (HMAC-SHA256)
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// API token for the app-hosting platform
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.digitalocean.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    /// Repository path of the declarative app spec
    #[serde(default = "default_spec_path")]
    pub spec_path: String,
    /// Deadline for handling a single pull request event, including the wait
    /// for the deployment to finish (default: 30 minutes)
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            spec_path: default_spec_path(),
            handler_timeout_secs: default_handler_timeout(),
        }
    }
}

fn default_spec_path() -> String {
    ".do/app.yaml".to_string()
}

fn default_handler_timeout() -> u64 {
    1800
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?;
        Ok(config)
    }
}
