//! Server configuration
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, bail};
use ordex_core::cluster::{ClusterConfig, Member, OrderingVariant};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/ordex.toml";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub addr: SocketAddr,
    /// Directory holding the order log
    pub data_dir: PathBuf,
    /// This replica's id
    pub replica_id: u16,
    /// Address peers use to reach this replica; overrides the member list
    pub self_url: Option<String>,
    /// Every replica URL in id order (id = position + 1)
    pub replicas: Vec<String>,
    /// Cluster size used with the URL template when `replicas` is empty
    pub total_replicas: u16,
    /// Ordering strategy
    pub variant: OrderingVariant,
    /// Catalog service; in-process catalog when absent
    pub catalog_url: Option<String>,
    /// Per peer call timeout
    pub peer_timeout: Duration,
    /// Liveness probe timeout
    pub probe_timeout: Duration,
    /// Anti-entropy pull timeout
    pub sync_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8998)),
            data_dir: PathBuf::from("./data"),
            replica_id: 1,
            self_url: None,
            replicas: Vec::new(),
            total_replicas: 3,
            variant: OrderingVariant::PrimaryBackup,
            catalog_url: None,
            peer_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(5),
            sync_timeout: Duration::from_secs(5),
        }
    }
}

/// On-disk shape of the config file; every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    addr: Option<SocketAddr>,
    data_dir: Option<PathBuf>,
    replica_id: Option<u16>,
    self_url: Option<String>,
    replicas: Option<Vec<String>>,
    total_replicas: Option<u16>,
    variant: Option<OrderingVariant>,
    catalog_url: Option<String>,
    peer_timeout_ms: Option<u64>,
    probe_timeout_ms: Option<u64>,
    sync_timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration from an optional file and the process environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        match path {
            Some(path) => config.apply_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    config.apply_file(default)?;
                } else {
                    tracing::debug!("No config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                }
            }
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from a TOML file
    pub fn apply_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        self.apply_toml(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Overlay values from TOML text
    pub fn apply_toml(&mut self, content: &str) -> anyhow::Result<()> {
        let file: ConfigFile = toml::from_str(content)?;
        if let Some(addr) = file.addr {
            self.addr = addr;
        }
        if let Some(data_dir) = file.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(replica_id) = file.replica_id {
            self.replica_id = replica_id;
        }
        if file.self_url.is_some() {
            self.self_url = file.self_url;
        }
        if let Some(replicas) = file.replicas {
            self.replicas = replicas;
        }
        if let Some(total) = file.total_replicas {
            self.total_replicas = total;
        }
        if let Some(variant) = file.variant {
            self.variant = variant;
        }
        if file.catalog_url.is_some() {
            self.catalog_url = file.catalog_url;
        }
        if let Some(ms) = file.peer_timeout_ms {
            self.peer_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.probe_timeout_ms {
            self.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.sync_timeout_ms {
            self.sync_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Overlay `ORDEX_*` variables read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(addr) = lookup("ORDEX_ADDR") {
            self.addr = addr.parse().with_context(|| format!("invalid ORDEX_ADDR '{}'", addr))?;
        }
        if let Some(dir) = lookup("ORDEX_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(id) = lookup("ORDEX_REPLICA_ID") {
            self.replica_id = id
                .parse()
                .with_context(|| format!("invalid ORDEX_REPLICA_ID '{}'", id))?;
        }
        if let Some(url) = lookup("ORDEX_SELF_URL") {
            self.self_url = Some(url);
        }
        if let Some(list) = lookup("ORDEX_REPLICAS") {
            self.replicas = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(total) = lookup("ORDEX_TOTAL_REPLICAS") {
            self.total_replicas = total
                .parse()
                .with_context(|| format!("invalid ORDEX_TOTAL_REPLICAS '{}'", total))?;
        }
        if let Some(variant) = lookup("ORDEX_VARIANT") {
            self.variant = variant.parse()?;
        }
        if let Some(url) = lookup("ORDEX_CATALOG_URL") {
            self.catalog_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(ms) = lookup("ORDEX_PEER_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("invalid ORDEX_PEER_TIMEOUT_MS '{}'", ms))?;
            self.peer_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Member list: explicit URLs, or the docker-style template
    /// `http://order-service-{id}:{8997 + id}`
    pub fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = if self.replicas.is_empty() {
            (1..=self.total_replicas)
                .map(|id| {
                    Member::new(
                        id,
                        format!("http://order-service-{}:{}", id, 8997 + u32::from(id)),
                    )
                })
                .collect()
        } else {
            self.replicas
                .iter()
                .enumerate()
                .map(|(i, url)| Member::new(i as u16 + 1, url.as_str()))
                .collect()
        };

        if let Some(url) = &self.self_url {
            if let Some(me) = members.iter_mut().find(|m| m.id == self.replica_id) {
                *me = Member::new(self.replica_id, url.as_str());
            }
        }
        members
    }

    /// Cluster configuration for the core
    pub fn cluster_config(&self) -> anyhow::Result<ClusterConfig> {
        if self.replica_id == 0 {
            bail!("replica ids start at 1");
        }
        let cluster = ClusterConfig::new(self.replica_id, self.members())
            .with_variant(self.variant)
            .with_peer_timeout(self.peer_timeout)
            .with_probe_timeout(self.probe_timeout)
            .with_sync_timeout(self.sync_timeout);
        cluster.validate()?;
        Ok(cluster)
    }

    /// Order log path of this replica
    pub fn log_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("order_log_{}.jsonl", self.replica_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_template_members() {
        let config = Config::default();
        let members = config.members();
        assert_eq!(members.len(), 3);
        assert_eq!(members[2].endpoint.as_str(), "http://order-service-3:9000");
        assert_eq!(config.log_path(), PathBuf::from("./data/order_log_1.jsonl"));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default();
        config
            .apply_toml(
                r#"
                replica_id = 2
                variant = "paxos"
                replicas = ["http://a:1", "http://b:2"]
                peer_timeout_ms = 750
                "#,
            )
            .unwrap();
        config
            .apply_env(env(&[
                ("ORDEX_REPLICA_ID", "1"),
                ("ORDEX_REPLICAS", "http://x:1, http://y:2,http://z:3"),
            ]))
            .unwrap();

        assert_eq!(config.replica_id, 1);
        assert_eq!(config.variant, OrderingVariant::Paxos);
        assert_eq!(config.peer_timeout, Duration::from_millis(750));
        let cluster = config.cluster_config().unwrap();
        assert_eq!(cluster.members.len(), 3);
        assert_eq!(cluster.quorum(), 2);
    }

    #[test]
    fn test_self_url_replaces_own_endpoint() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("ORDEX_REPLICA_ID", "2"),
                ("ORDEX_SELF_URL", "http://127.0.0.1:8999"),
            ]))
            .unwrap();
        let cluster = config.cluster_config().unwrap();
        assert_eq!(
            cluster.self_member().unwrap().endpoint.as_str(),
            "http://127.0.0.1:8999"
        );
    }

    #[test]
    fn test_example_file_parses() {
        let mut config = Config::default();
        config
            .apply_toml(include_str!("../../config/ordex.example.toml"))
            .unwrap();
        assert_eq!(config.members().len(), 3);
        assert!(config.catalog_url.is_none());
        config.cluster_config().unwrap();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("ORDEX_ADDR", "nowhere")])).is_err());
        assert!(config.apply_env(env(&[("ORDEX_VARIANT", "raft")])).is_err());
        assert!(config.apply_toml("unknown_key = 1").is_err());

        let mut config = Config::default();
        config.replica_id = 7;
        assert!(config.cluster_config().is_err());
    }
}
