//! Settings that used to be hardcoded: where to talk to, how long to wait,
//! and the defaults the `download` command falls back on.

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use fs_err as fs;
use serde::Deserialize;
use thiserror::Error;

use crate::time_window::TimeWindow;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Timeout applied to every HTTP request, in seconds.
    pub timeout_secs: u64,

    /// How many posts to process when `--limit` isn't given.
    pub default_limit: u32,

    pub default_time_window: TimeWindow,

    pub default_directory: PathBuf,

    /// Base URL of the listing API, without a trailing slash.
    pub api_base: String,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            default_limit: 100,
            default_time_window: TimeWindow::Week,
            default_directory: PathBuf::from("./"),
            api_base: "https://www.reddit.com".to_owned(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("Error deserializing config file {path}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("default-limit must be greater than 0")]
    InvalidLimit,

    #[error("timeout-secs must be greater than 0")]
    InvalidTimeout,
}

impl Config {
    pub fn read_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_owned(),
            source,
        })?;

        config.validate()?;
        log::debug!("loaded config from {}", path.display());

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::InvalidLimit);
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(())
    }
}
