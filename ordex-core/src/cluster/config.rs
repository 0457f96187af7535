//! Cluster membership and timeouts

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Address of a replica's RPC surface, e.g. `http://order-service-3:9000`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    /// Wrap an address, trimming any trailing slash
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self(address.trim_end_matches('/').to_string())
    }

    /// The raw address
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// One replica of the fixed membership list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Replica identifier, also the low bits of its proposal ids
    pub id: u16,
    /// RPC address
    pub endpoint: Endpoint,
}

impl Member {
    /// Create a member
    pub fn new(id: u16, endpoint: impl Into<Endpoint>) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
        }
    }
}

impl From<String> for Endpoint {
    fn from(address: String) -> Self {
        Self::new(address)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica {} ({})", self.id, self.endpoint)
    }
}

/// Ordering strategy used by the write path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingVariant {
    /// Leader sequences, pushes to followers, followers pull gaps
    #[default]
    PrimaryBackup,
    /// Every order needs a prepare/accept quorum before sequencing
    Paxos,
}

impl std::str::FromStr for OrderingVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary_backup" | "primary-backup" => Ok(Self::PrimaryBackup),
            "paxos" => Ok(Self::Paxos),
            other => Err(Error::config(format!("unknown ordering variant '{}'", other))),
        }
    }
}

impl fmt::Display for OrderingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryBackup => f.write_str("primary_backup"),
            Self::Paxos => f.write_str("paxos"),
        }
    }
}

/// Cluster configuration of one replica
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// This replica's id
    pub replica_id: u16,

    /// Every replica of the cluster, self included
    pub members: Vec<Member>,

    /// Ordering strategy
    pub variant: OrderingVariant,

    /// Liveness probe timeout used by election
    pub probe_timeout: Duration,

    /// Timeout of a single peer call (replicate, prepare, accept, max)
    pub peer_timeout: Duration,

    /// Timeout of a single anti-entropy pull
    pub sync_timeout: Duration,
}

impl ClusterConfig {
    /// Create a configuration with default timeouts
    pub fn new(replica_id: u16, members: Vec<Member>) -> Self {
        Self {
            replica_id,
            members,
            variant: OrderingVariant::default(),
            probe_timeout: Duration::from_secs(5),
            peer_timeout: Duration::from_secs(2),
            sync_timeout: Duration::from_secs(5),
        }
    }

    /// Set the ordering variant
    pub fn with_variant(mut self, variant: OrderingVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the peer call timeout
    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    /// Set the anti-entropy timeout
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// This replica's membership entry
    pub fn self_member(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.id == self.replica_id)
    }

    /// Every member except this replica
    pub fn peers(&self) -> Vec<Member> {
        self.members
            .iter()
            .filter(|m| m.id != self.replica_id)
            .cloned()
            .collect()
    }

    /// Look up a member by id
    pub fn member(&self, id: u16) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Strict majority of the membership, proposer included
    pub fn quorum(&self) -> usize {
        self.members.len() / 2 + 1
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(Error::config("cluster has no members"));
        }
        if self.self_member().is_none() {
            return Err(Error::config(format!(
                "replica {} is not in the member list",
                self.replica_id
            )));
        }

        let mut ids = HashSet::new();
        let mut endpoints = HashSet::new();
        for member in &self.members {
            if member.endpoint.as_str().is_empty() {
                return Err(Error::config(format!("replica {} has no endpoint", member.id)));
            }
            if !ids.insert(member.id) {
                return Err(Error::config(format!("duplicate replica id {}", member.id)));
            }
            if !endpoints.insert(&member.endpoint) {
                return Err(Error::config(format!("duplicate endpoint {}", member.endpoint)));
            }
        }

        if self.probe_timeout.is_zero() || self.peer_timeout.is_zero() || self.sync_timeout.is_zero()
        {
            return Err(Error::config("timeouts must be non-zero"));
        }
        Ok(())
    }
}
