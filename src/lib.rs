pub mod api;
pub mod config;
pub mod engine;
pub mod github;
pub mod platform;
pub mod spec;

use std::sync::Arc;

use config::Config;
use engine::PreviewEngine;

pub struct AppState {
    pub config: Config,
    pub engine: Arc<PreviewEngine>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<PreviewEngine>) -> Self {
        Self { config, engine }
    }
}
