//! Render command handler.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use ochat_core::config::Config;
use ochat_core::render::{Highlighter, Reconciler, ToolCapabilities};

pub fn run(config: &Config, file: &Path, theme: Option<&str>, python: bool) -> Result<()> {
    let source = if file == Path::new("-") {
        let mut source = String::new();
        std::io::stdin()
            .lock()
            .read_to_string(&mut source)
            .context("read markdown from stdin")?;
        source
    } else {
        std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?
    };

    let highlighter = Highlighter::new(theme.unwrap_or(&config.theme));
    let reconciler = Reconciler::new(highlighter, ToolCapabilities { python });
    println!("{}", reconciler.render_static(&source).html());
    Ok(())
}
