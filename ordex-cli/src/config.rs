//! CLI configuration: the replica list and client timeouts

use anyhow::{Result, bail};
use ordex_core::cluster::Member;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Replica URLs in id order; replica `i` has id `i + 1`
    pub replicas: Vec<String>,
    /// Liveness probe and notification timeout, in milliseconds
    pub probe_timeout_ms: u64,
    /// Timeout of every other request, in milliseconds
    pub request_timeout_ms: u64,
    /// Attempts per routed request
    pub max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replicas: (1..=3)
                .map(|id| format!("http://localhost:{}", 8997 + id))
                .collect(),
            probe_timeout_ms: 5_000,
            request_timeout_ms: 5_000,
            max_attempts: 3,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(config_path)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ordex")
            .join("config.toml")
    }

    /// Replace the replica list with a comma-separated one
    pub fn set_replicas(&mut self, list: &str) -> Result<()> {
        let replicas: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if replicas.is_empty() {
            bail!("replica list is empty");
        }
        self.replicas = replicas;
        Ok(())
    }

    /// Cluster members derived from the replica list
    pub fn members(&self) -> Result<Vec<Member>> {
        if self.replicas.is_empty() {
            bail!("no replicas configured; pass --replicas or run `ordex config set-replicas`");
        }
        Ok(self
            .replicas
            .iter()
            .enumerate()
            .map(|(i, url)| Member::new(i as u16 + 1, url.as_str()))
            .collect())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
