//! GitHub webhook endpoint.
//!
//! Verifies the payload signature, parses the event, and hands pull request
//! events off to the preview engine on their own task. The HTTP response
//! only acknowledges receipt; handling outcomes are logged, and GitHub's
//! redelivery is the retry mechanism for failed handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::github::PullRequestEvent;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Verify a GitHub webhook signature (X-Hub-Signature-256 header)
fn verify_signature(secret: &str, signature_header: &str, payload: &[u8]) -> bool {
    // Signature format: sha256=<hex>
    let signature = match signature_header.strip_prefix("sha256=") {
        Some(sig) => sig,
        None => return false,
    };

    let expected = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("GitHub webhook missing X-Hub-Signature-256 header");
            StatusCode::UNAUTHORIZED
        })?;

    if !verify_signature(&state.config.github.webhook_secret, signature, &body) {
        tracing::warn!("GitHub webhook signature verification failed");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let delivery = headers
        .get("X-GitHub-Delivery")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match event_type {
        "pull_request" => {
            let event: PullRequestEvent = serde_json::from_slice(&body).map_err(|e| {
                tracing::error!("Failed to parse pull request event: {}", e);
                StatusCode::BAD_REQUEST
            })?;

            tracing::info!(
                delivery = %delivery,
                action = %event.action,
                pr = event.number,
                repo = %event.repository.name,
                "received pull request event"
            );

            let engine = state.engine.clone();
            let timeout = Duration::from_secs(state.config.previews.handler_timeout_secs);
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                {
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(timeout).await;
                        cancel.cancel();
                    });
                }

                if let Err(e) = engine.handle(&event, &cancel).await {
                    tracing::error!(
                        delivery = %delivery,
                        action = %event.action,
                        pr = event.number,
                        error = %format!("{:#}", e),
                        "failed to handle pull request event"
                    );
                }
            });

            Ok(StatusCode::ACCEPTED)
        }
        "ping" => {
            tracing::info!("received GitHub ping webhook");
            Ok(StatusCode::OK)
        }
        other => {
            tracing::debug!(event = other, "ignoring webhook event");
            Ok(StatusCode::OK)
        }
    }
}
