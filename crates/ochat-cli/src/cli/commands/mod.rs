//! CLI command handlers.

pub mod chat;
pub mod config;
pub mod dialogs;
pub mod model;
pub mod render;

use anyhow::{Context, Result};
use ochat_core::client::{ApiClient, ApiConfig};
use ochat_core::config::Config;

/// Client for the configured server, with `base_url` overriding config.
pub fn api_client(config: &Config, base_url: Option<&str>) -> Result<ApiClient> {
    let url = config.resolve_base_url(base_url)?;
    let mut api_config = ApiConfig::new(url);
    api_config.session_cookie.clone_from(&config.session_cookie);
    ApiClient::new(api_config).context("build HTTP client")
}
