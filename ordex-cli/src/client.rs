//! Cluster client used by every command

use anyhow::Result;
use futures::future::join_all;
use ordex_core::cluster::{Health, LeaderElector, LeaderRouter, Member, PeerClient, with_timeout};
use ordex_core::retry::RetryConfig;
use ordex_core::{Order, OrderRequest};
use ordex_protocol::HttpPeerClient;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// One row of `cluster status`
#[derive(Debug)]
pub struct ReplicaStatus {
    pub member: Member,
    pub health: ordex_core::Result<Health>,
}

pub struct OrderClient {
    members: Vec<Member>,
    peers: Arc<dyn PeerClient>,
    router: LeaderRouter,
    probe_timeout: Duration,
}

impl OrderClient {
    pub fn new(config: &Config) -> Result<Self> {
        let members = config.members()?;
        let peers: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new(config.request_timeout())?);
        let elector = LeaderElector::new(
            members.clone(),
            peers.clone(),
            config.probe_timeout(),
            config.probe_timeout(),
        );
        let retry = RetryConfig {
            max_attempts: config.max_attempts.max(1),
            ..RetryConfig::default()
        };
        let router = LeaderRouter::new(elector, peers.clone(), retry, config.probe_timeout());
        Ok(Self {
            members,
            peers,
            router,
            probe_timeout: config.probe_timeout(),
        })
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Ping every replica concurrently
    pub async fn status(&self) -> Vec<ReplicaStatus> {
        join_all(self.members.iter().map(|member| async move {
            let health = with_timeout(
                self.probe_timeout,
                &member.endpoint,
                self.peers.ping(&member.endpoint),
            )
            .await;
            ReplicaStatus {
                member: member.clone(),
                health,
            }
        }))
        .await
    }

    /// Run an election and announce the winner
    pub async fn elect(&self) -> ordex_core::Result<Member> {
        self.router.elect().await
    }

    pub async fn place_order(&self, request: &OrderRequest) -> ordex_core::Result<u64> {
        self.router.place_order(request).await
    }

    pub async fn get_order(&self, transaction_number: u64) -> ordex_core::Result<Order> {
        self.router.get_order(transaction_number).await
    }

    /// Leader the last routed call went to
    pub fn leader(&self) -> Option<Member> {
        self.router.cached_leader()
    }
}
