//! Chat command handler.

use std::io::{BufReader, IsTerminal};

use anyhow::{Context, Result};
use ochat_core::client::{ApiClient, FrontendConfig};
use ochat_core::config::{self, Config, LocalState};
use ochat_core::core::interrupt;
use ochat_core::core::session::DialogSession;
use ochat_core::location;
use ochat_core::render::{Highlighter, Reconciler};

use crate::modes::repl;
use crate::modes::terminal::TerminalView;

pub async fn run(
    config: &Config,
    base_url: Option<&str>,
    dialog: Option<&str>,
    model_override: Option<&str>,
) -> Result<()> {
    let client = super::api_client(config, base_url)?;

    let frontend = match client.frontend_config().await {
        Ok(frontend) => frontend,
        Err(err) => {
            tracing::warn!("frontend config unavailable, using defaults: {err}");
            FrontendConfig::default()
        }
    };
    let options = model_options(&client, config).await;

    let mut state = LocalState::load().context("load local state")?;
    let model = config::select_model(
        model_override,
        &state,
        config,
        &options,
        frontend.default_model.as_deref(),
    )
    .context("No model available. Pass --model or set `model` in the config")?;
    if model_override.is_some() && state.selected_model.as_deref() != Some(model.as_str()) {
        state.selected_model = Some(model.clone());
        if let Err(err) = state.save() {
            tracing::warn!("saving selected model failed: {err:#}");
        }
    }
    tracing::info!(%model, format = %config.wire_format, "starting chat");

    let base = client.base_url().clone();
    let reconciler = Reconciler::new(Highlighter::new(&config.theme), frontend.tools());
    let mut session = DialogSession::new(client, reconciler, config.wire_format, model.clone());
    session.apply_frontend_config(&frontend);

    let interactive = std::io::stdin().is_terminal();
    let mut view = TerminalView::stdio(base.clone()).with_echo(!interactive);

    if let Some(reference) = dialog {
        let id = location::parse_dialog_ref(reference)
            .with_context(|| format!("Invalid dialog reference '{reference}'"))?;
        session
            .load(id, &mut view)
            .await
            .with_context(|| format!("load dialog '{reference}'"))?;
    }

    interrupt::reset();
    let canceller = session.canceller();
    ctrlc::set_handler(move || {
        if !canceller.abort() {
            interrupt::trigger_ctrl_c();
        }
    })
    .context("install Ctrl+C handler")?;

    view.say(&format!("ochat: {base} ({model})"));
    view.say("Type a message and press Enter. :help for commands, :q to quit.");

    let stdin = BufReader::new(std::io::stdin());
    repl::run(stdin, &mut session, &mut view, interactive)
        .await
        .context("interactive chat failed")
}

/// Models offered by the server, falling back to the configured list.
async fn model_options(client: &ApiClient, config: &Config) -> Vec<String> {
    match client.model_names().await {
        Ok(names) if !names.is_empty() => names,
        Ok(_) => config.models.clone(),
        Err(err) => {
            tracing::warn!("model list unavailable: {err}");
            config.models.clone()
        }
    }
}
