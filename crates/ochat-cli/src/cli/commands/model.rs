//! Model command handlers.

use anyhow::{Context, Result};
use ochat_core::config::{Config, LocalState};

pub async fn list(config: &Config, base_url: Option<&str>) -> Result<()> {
    let client = super::api_client(config, base_url)?;
    let names = client.model_names().await.context("list models")?;
    if names.is_empty() {
        println!("The server offers no models.");
        return Ok(());
    }

    let state = LocalState::load().context("load local state")?;
    let current = state
        .restored_model(&names)
        .or(config.model.as_deref());
    for name in &names {
        let marker = if Some(name.as_str()) == current { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}

/// Saves `name` as the configured model and the last selection.
pub fn set(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Model name must not be empty");
    }
    Config::save_model(name).context("save model to config")?;
    LocalState {
        selected_model: Some(name.to_string()),
    }
    .save()
    .context("save local state")?;
    println!("Model set to {name}");
    Ok(())
}
