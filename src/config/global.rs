use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::DocweaveError;
use crate::reactor::ReactorOptions;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV_VAR: &str = "DOCWEAVE_CONFIG";

const DEFAULT_GIT_HOST: &str = "github.com";

/// Worker pool defaults. Unset values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<usize>,
}

/// User-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Hosts served by the git resource handler, in addition to every host
    /// with a token.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub git_hosts: Vec<String>,

    /// Access tokens by host. Sent as an authorization header when cloning
    /// or fetching; never logged.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tokens: HashMap<String, String>,

    /// Where repository working copies are kept between runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub workers: WorkerDefaults,
}

impl GlobalConfig {
    /// Loads the file named by `DOCWEAVE_CONFIG`, or the default file.
    /// A missing file yields the default configuration.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from)).await
    }

    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .map_err(|e| DocweaveError::ConfigError {
                message: e.to_string(),
            })
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// `~/.docweave/config.toml`, or `%LOCALAPPDATA%\docweave\config.toml` on
    /// Windows.
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    fn config_dir() -> Result<PathBuf> {
        if cfg!(target_os = "windows") {
            Ok(dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("docweave"))
        } else {
            Ok(dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".docweave"))
        }
    }

    /// The configured cache directory, or `cache/` next to the config file.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("cache")),
        }
    }

    /// Git hosts to serve: configured hosts plus hosts with a token, sorted
    /// and lowercased. Defaults to `github.com`.
    #[must_use]
    pub fn git_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .git_hosts
            .iter()
            .chain(self.tokens.keys())
            .map(|host| normalize_host(host))
            .collect();
        hosts.sort();
        hosts.dedup();
        if hosts.is_empty() {
            hosts.push(DEFAULT_GIT_HOST.to_string());
        }
        hosts
    }

    /// Tokens keyed by normalized host.
    #[must_use]
    pub fn host_tokens(&self) -> HashMap<String, String> {
        self.tokens.iter().map(|(host, token)| (normalize_host(host), token.clone())).collect()
    }

    /// Reactor options with the `[workers]` defaults applied.
    #[must_use]
    pub fn reactor_options(&self) -> ReactorOptions {
        let defaults = ReactorOptions::default();
        ReactorOptions {
            min_workers: self.workers.min.unwrap_or(defaults.min_workers),
            max_workers: self.workers.max.unwrap_or(defaults.max_workers),
            download_workers: self.workers.downloads.unwrap_or(defaults.download_workers),
            ..defaults
        }
    }
}

/// Accepts `host`, `https://host` or `https://host/` and returns `host`.
fn normalize_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_lowercase()
}
