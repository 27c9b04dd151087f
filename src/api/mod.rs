mod webhooks;

use axum::{routing::post, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/github", post(webhooks::github_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
