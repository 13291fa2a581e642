//! File logging.
//!
//! Stdout and stderr belong to the front end, so logs go to
//! `$OCHAT_HOME/logs/ochat.log` through a non-blocking writer.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "OCHAT_LOG";
pub const LOG_FILE: &str = "ochat.log";
const DEFAULT_FILTER: &str = "warn";
const DEBUG_FILTER: &str = "ochat=debug,ochat_core=debug";

/// Installs the global subscriber writing to `log_dir`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the writer. A second call leaves the first subscriber
/// in place.
pub fn init(log_dir: &Path, debug: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let path = log_dir.join(LOG_FILE);
    let file = options
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(file);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter(debug));

    let _ = tracing_subscriber::registry().with(layer).try_init();

    Ok(guard)
}

fn filter(debug: bool) -> EnvFilter {
    let default = if debug { DEBUG_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}
