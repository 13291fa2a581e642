//! Dialog command handlers.

use anyhow::{Context, Result};
use ochat_core::client::DialogId;
use ochat_core::config::Config;
use ochat_core::core::session::DialogSession;
use ochat_core::location;
use ochat_core::render::{Highlighter, Reconciler, ToolCapabilities};

use crate::modes::terminal::TerminalView;

fn dialog_id(reference: &str) -> Result<DialogId> {
    location::parse_dialog_ref(reference)
        .with_context(|| format!("Invalid dialog reference '{reference}'"))
}

pub async fn show(config: &Config, base_url: Option<&str>, reference: &str, html: bool) -> Result<()> {
    let id = dialog_id(reference)?;
    let client = super::api_client(config, base_url)?;

    let info = client
        .dialog_info(&id)
        .await
        .with_context(|| format!("load dialog '{id}'"))?;
    let title = if info.title.is_empty() {
        "(untitled)"
    } else {
        info.title.as_str()
    };
    println!("{title}  {}", client.dialog_url(&id));

    let base = client.base_url().clone();
    let reconciler = Reconciler::new(Highlighter::new(&config.theme), ToolCapabilities::default());
    let model = config.model.clone().unwrap_or_default();
    let mut session = DialogSession::new(client, reconciler, config.wire_format, model);
    let mut view = TerminalView::stdio(base).with_html(html);

    let count = session
        .load(id.clone(), &mut view)
        .await
        .with_context(|| format!("load messages of dialog '{id}'"))?;
    if count == 0 {
        println!("Dialog '{id}' has no messages.");
    }
    Ok(())
}

pub async fn delete(config: &Config, base_url: Option<&str>, reference: &str) -> Result<()> {
    let id = dialog_id(reference)?;
    let client = super::api_client(config, base_url)?;
    client
        .delete_dialog(&id)
        .await
        .with_context(|| format!("delete dialog '{id}'"))?;
    println!("Deleted dialog {id}");
    Ok(())
}
