use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use previewr::config::Config;
use previewr::engine::PreviewEngine;
use previewr::github::AppClientFactory;
use previewr::platform::PlatformClient;
use previewr::AppState;

#[derive(Parser, Debug)]
#[command(name = "previewr")]
#[command(author, version, about = "Preview apps for pull requests", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "previewr.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting previewr v{}", env!("CARGO_PKG_VERSION"));

    let private_key = std::fs::read_to_string(&config.github.private_key_path)
        .with_context(|| {
            format!(
                "Failed to read GitHub App private key: {}",
                config.github.private_key_path.display()
            )
        })?;

    let github = Arc::new(AppClientFactory::new(config.github.app_id, private_key));
    let platform = Arc::new(PlatformClient::new(
        config.platform.token.clone(),
        config.platform.api_base.clone(),
    ));
    let engine = Arc::new(PreviewEngine::new(
        github,
        platform,
        config.previews.spec_path.clone(),
    ));

    let state = Arc::new(AppState::new(config.clone(), engine));
    let app = previewr::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Webhook server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
