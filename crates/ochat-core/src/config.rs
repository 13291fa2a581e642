use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::render::highlight::DEFAULT_THEME;
use crate::stream::wire::WireFormat;

/// Environment variable overriding `base_url`.
pub const BASE_URL_ENV: &str = "OCHAT_BASE_URL";

/// Returns the default config template with comments.
///
/// Embedded from `default_config.toml` at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// New comments from the template stay present while the user's values win.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => target[key] = Item::Value(v.clone()),
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => target[key] = Item::ArrayOfTables(src_arr.clone()),
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for ochat configuration and data.
    //!
    //! `OCHAT_HOME` resolution order:
    //! 1. `OCHAT_HOME` environment variable (if set)
    //! 2. `~/.config/ochat`

    use std::path::PathBuf;

    pub const HOME_ENV: &str = "OCHAT_HOME";

    /// Returns the ochat home directory.
    pub fn ochat_home() -> PathBuf {
        if let Ok(home) = std::env::var(HOME_ENV)
            && !home.is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".ochat"),
            |h| h.join(".config").join("ochat"),
        )
    }

    pub fn config_path() -> PathBuf {
        ochat_home().join("config.toml")
    }

    /// Persisted UI state, such as the last selected model.
    pub fn state_path() -> PathBuf {
        ochat_home().join("state.toml")
    }

    pub fn logs_dir() -> PathBuf {
        ochat_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat server base URL
    pub base_url: String,
    /// Preferred model; the server default is used when unset
    pub model: Option<String>,
    /// Fallback model options when `/list` is unavailable
    pub models: Vec<String>,
    /// Frame shape of the `/chat` stream
    pub wire_format: WireFormat,
    /// Raw `Cookie` header value for an authenticated session
    pub session_cookie: Option<String>,
    /// Highlighting theme
    pub theme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: None,
            models: Vec::new(),
            wire_format: WireFormat::default(),
            session_cookie: None,
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl Config {
    const DEFAULT_BASE_URL: &str = "http://localhost:8000";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Base URL, preferring a non-empty override.
    pub fn resolve_base_url(&self, override_url: Option<&str>) -> Result<Url> {
        let raw = override_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.base_url);
        Url::parse(raw).with_context(|| format!("Invalid base_url '{raw}'"))
    }

    /// Saves only the model field to the config file.
    pub fn save_model(model: &str) -> Result<()> {
        Self::save_model_to(&paths::config_path(), model)
    }

    /// Saves only the model field to a specific config file path.
    ///
    /// Creates the file from the default template if it doesn't exist and
    /// preserves existing fields and comments otherwise.
    pub fn save_model_to(path: &Path, model: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        doc["model"] = value(model);

        write_atomic(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        write_atomic(path, default_config_template())
    }
}

/// UI state persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalState {
    /// Model picked last time
    pub selected_model: Option<String>,
}

impl LocalState {
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::state_path())
    }

    /// Loads state, falling back to defaults when missing or unreadable.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state from {}", path.display()))?;
        match toml::from_str(&contents) {
            Ok(state) => Ok(state),
            Err(err) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable state file: {err}");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::state_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string(self).context("Failed to serialize state")?;
        write_atomic(path, &contents)
    }

    /// The saved model, only if it is still one of `options`.
    pub fn restored_model<'a>(&self, options: &'a [String]) -> Option<&'a str> {
        let saved = self.selected_model.as_deref()?;
        options.iter().find(|m| *m == saved).map(String::as_str)
    }
}

/// Picks the model for a session.
///
/// Order: explicit choice, restored state, configured model, the server's
/// default, then the first option.
pub fn select_model(
    explicit: Option<&str>,
    state: &LocalState,
    config: &Config,
    options: &[String],
    server_default: Option<&str>,
) -> Option<String> {
    explicit
        .or_else(|| state.restored_model(options))
        .or(config.model.as_deref())
        .or(server_default)
        .or_else(|| options.first().map(String::as_str))
        .map(str::to_string)
}

/// Writes a file via temp file and rename, creating parent directories.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
