//! Configuration file handling
//!
//! Connection defaults may be stored in `config.toml` in the platform config
//! directory; command-line flags always win over file values.

use serde::Deserialize;

use super::paths::config_path;
use super::Result;

/// Connection defaults loaded from the config file
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Base URL of the orchestration API
    pub url: Option<String>,

    /// WebSocket base URL, if different from the API URL
    pub ws_url: Option<String>,

    /// Dashboard base URL for deep links
    pub dashboard_url: Option<String>,

    /// Cloud organization id
    pub organization: Option<String>,

    /// Cloud environment id
    pub environment: Option<String>,

    /// API token
    pub token: Option<String>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if the file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content =
                    std::fs::read_to_string(&path).map_err(|e| super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    })?;
                return toml::from_str(&content)
                    .map_err(|e| super::Error::ConfigParse(e.to_string()));
            }
        }
        Ok(Self::default())
    }
}
