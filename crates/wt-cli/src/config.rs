//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Endpoint of the remote work-log service.
    #[serde(default)]
    pub push_url: Option<String>,
    /// Bearer token for the remote work-log service.
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    /// Default floor for exported durations, in seconds.
    #[serde(default)]
    pub min_export_seconds: i64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("push_url", &self.push_url)
            .field("push_token", &self.push_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_name", &self.user_name)
            .field("user_email", &self.user_email)
            .field("min_export_seconds", &self.min_export_seconds)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("wt.db"),
            push_url: None,
            push_token: None,
            user_name: None,
            user_email: None,
            min_export_seconds: 0,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `config_path`,
    /// then `WT_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("WT_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for wt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wt"))
}

/// Returns the platform-specific data directory for wt.
///
/// On Linux: `~/.local/share/wt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("wt"))
}
