use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_API_URL: &str = "TASKDASH_API_URL";
pub const ENV_DATA_DIR: &str = "TASKDASH_DATA_DIR";
pub const APP_DIR_NAME: &str = "task-dashboard";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no data directory available; pass --data-dir or set TASKDASH_DATA_DIR")]
    NoDataDir,
    #[error("request_timeout_secs must be greater than zero when set")]
    ZeroTimeout,
    #[error("api_base_url must not be empty")]
    EmptyBaseUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DashboardConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Unset means requests wait as long as the server takes.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// flexi_logger spec; `TASKDASH_LOG` and `RUST_LOG` take precedence.
    #[serde(default)]
    pub log_spec: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: None,
            log_spec: None,
        }
    }
}

impl DashboardConfig {
    /// Later sources win: the file, then the environment, then CLI flags.
    pub fn with_overrides(mut self, env_api_url: Option<String>, cli_api_url: Option<String>) -> Self {
        let chosen = cli_api_url
            .filter(|value| !value.trim().is_empty())
            .or_else(|| env_api_url.filter(|value| !value.trim().is_empty()));
        if let Some(url) = chosen {
            self.api_base_url = url.trim().to_string();
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// CLI flag, then `TASKDASH_DATA_DIR`, then the platform data dir.
pub fn resolve_data_dir(
    cli: Option<PathBuf>,
    env: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    cli.or(env)
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME)))
        .ok_or(ConfigError::NoDataDir)
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
