//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ochat_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "ochat")]
#[command(version)]
#[command(about = "Terminal client for a self-hosted Ollama chat server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Chat server base URL (overrides `base_url` in config)
    #[arg(long, global = true, env = config::BASE_URL_ENV, value_name = "URL")]
    base_url: Option<String>,

    /// Log at debug level to $OCHAT_HOME/logs/ochat.log
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Chat interactively (the default)
    Chat {
        /// Continue a saved dialog, by id or page URL
        #[arg(long, value_name = "DIALOG")]
        dialog: Option<String>,

        /// Override the model for this session
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Inspect or delete saved dialogs
    Dialogs {
        #[command(subcommand)]
        command: DialogCommands,
    },

    /// Render a markdown file to HTML the way replies are rendered
    Render {
        /// Markdown file, or `-` for stdin
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Highlighting theme (overrides `theme` in config)
        #[arg(long)]
        theme: Option<String>,

        /// Offer the execute action on python code blocks
        #[arg(long)]
        python: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// List or select models
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },
}

#[derive(clap::Subcommand)]
enum DialogCommands {
    /// Prints a saved dialog
    Show {
        /// Dialog id or page URL
        #[arg(value_name = "DIALOG")]
        dialog: String,

        /// Print assistant messages as rendered HTML
        #[arg(long)]
        html: bool,
    },
    /// Deletes a saved dialog
    Delete {
        /// Dialog id or page URL
        #[arg(value_name = "DIALOG")]
        dialog: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

#[derive(clap::Subcommand)]
enum ModelCommands {
    /// Lists the models the server offers
    List,
    /// Selects the model used for new turns
    Set {
        #[arg(value_name = "MODEL")]
        name: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match logging::init(&config::paths::logs_dir(), cli.debug) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        }
    };

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;

    let Cli {
        command,
        base_url,
        debug: _,
    } = cli;
    let base_url = base_url.as_deref();

    // default to chat mode
    let Some(command) = command else {
        return commands::chat::run(&config, base_url, None, None).await;
    };

    match command {
        Commands::Chat { dialog, model } => {
            commands::chat::run(&config, base_url, dialog.as_deref(), model.as_deref()).await
        }

        Commands::Dialogs { command } => match command {
            DialogCommands::Show { dialog, html } => {
                commands::dialogs::show(&config, base_url, &dialog, html).await
            }
            DialogCommands::Delete { dialog } => {
                commands::dialogs::delete(&config, base_url, &dialog).await
            }
        },

        Commands::Render {
            file,
            theme,
            python,
        } => commands::render::run(&config, &file, theme.as_deref(), python),

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },

        Commands::Model { command } => match command {
            ModelCommands::List => commands::model::list(&config, base_url).await,
            ModelCommands::Set { name } => commands::model::set(&name),
        },
    }
}
