// Configuration loaded from ~/.pipeboard/rc
//
// The rc file holds `key=value` lines; blank lines and `#` comments are
// ignored. Recognised keys:
//   data.location=<path>   SQLite database for the local store
//   api.url=<url>          REST backend; when set, the HTTP provider is used
//   api.token=<token>      bearer token for the REST session

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".pipeboard";
const CONFIG_FILE: &str = "rc";
const DEFAULT_DB_FILE: &str = "pipeline.db";

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_location: PathBuf,
    pub api_url: Option<String>,
    pub api_token: Option<String>,
}

impl Config {
    /// Directory holding the rc file and the default database
    pub fn config_dir() -> Result<PathBuf> {
        // HOME wins so tests can redirect the whole config tree
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .context("Failed to determine home directory")?;
        Ok(home.join(CONFIG_DIR))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load configuration from the rc file, falling back to defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::defaults(&Self::config_dir()?);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
            config.apply(&content, &config_path);
            log::debug!("Loaded configuration from {}", config_path.display());
        }

        Ok(config)
    }

    fn defaults(config_dir: &Path) -> Self {
        Self {
            data_location: config_dir.join(DEFAULT_DB_FILE),
            api_url: None,
            api_token: None,
        }
    }

    /// Apply rc file content on top of the current values
    fn apply(&mut self, content: &str, config_path: &Path) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::warn!("Ignoring malformed config line: {}", line);
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "data.location" => {
                    let path = PathBuf::from(value);
                    // Relative paths resolve against the rc file's directory
                    self.data_location = if path.is_relative() {
                        config_path.parent().map(|dir| dir.join(&path)).unwrap_or(path)
                    } else {
                        path
                    };
                }
                "api.url" if !value.is_empty() => {
                    self.api_url = Some(value.trim_end_matches('/').to_string());
                }
                "api.token" if !value.is_empty() => {
                    self.api_token = Some(value.to_string());
                }
                other => log::warn!("Ignoring unknown config key: {}", other),
            }
        }
    }
}
