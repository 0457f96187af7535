//! Client-driven leader routing
//!
//! There is no heartbeat. Whoever needs the leader pings it before each
//! attempt and re-elects when it does not answer or turns out not to lead.

use super::config::Member;
use super::elector::LeaderElector;
use super::peer::{PeerClient, with_timeout};
use crate::order::{Order, OrderRequest};
use crate::retry::RetryConfig;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Routes requests to the current leader, re-electing on failure
pub struct LeaderRouter {
    elector: LeaderElector,
    peers: Arc<dyn PeerClient>,
    retry: RetryConfig,
    probe_timeout: Duration,
    leader: RwLock<Option<Member>>,
}

impl LeaderRouter {
    /// Create a router
    pub fn new(
        elector: LeaderElector,
        peers: Arc<dyn PeerClient>,
        retry: RetryConfig,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            elector,
            peers,
            retry,
            probe_timeout,
            leader: RwLock::new(None),
        }
    }

    /// Cached leader, if any
    pub fn cached_leader(&self) -> Option<Member> {
        self.leader.read().clone()
    }

    /// Force a fresh election
    pub async fn elect(&self) -> Result<Member> {
        let leader = self.elector.elect().await?;
        *self.leader.write() = Some(leader.clone());
        Ok(leader)
    }

    fn forget(&self) {
        *self.leader.write() = None;
    }

    async fn current_leader(&self) -> Result<Member> {
        if let Some(leader) = self.cached_leader() {
            return Ok(leader);
        }
        self.elect().await
    }

    /// Place an order on the leader
    pub async fn place_order(&self, request: &OrderRequest) -> Result<u64> {
        self.route(|leader| {
            let peers = self.peers.clone();
            let request = request.clone();
            async move { peers.place_order(&leader.endpoint, &request).await }
        })
        .await
    }

    /// Look an order up on the leader
    pub async fn get_order(&self, transaction_number: u64) -> Result<Order> {
        self.route(|leader| {
            let peers = self.peers.clone();
            async move { peers.get_order(&leader.endpoint, transaction_number).await }
        })
        .await
    }

    /// Run `call` against the leader within the retry budget
    pub async fn route<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: Fn(Member) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let leader = match self.current_leader().await {
                Ok(leader) => leader,
                Err(e) => {
                    tracing::error!("No leader could be elected: {}", e);
                    return Err(Error::leader_unavailable(e.to_string()));
                }
            };

            let probe = with_timeout(
                self.probe_timeout,
                &leader.endpoint,
                self.peers.ping(&leader.endpoint),
            )
            .await;
            if let Err(e) = probe {
                tracing::warn!("Leader {} unreachable (attempt {}/{}): {}", leader, attempt, attempts, e);
                self.forget();
                last_error = Some(e);
                continue;
            }

            match call(leader.clone()).await {
                Ok(value) => return Ok(value),
                Err(e @ (Error::NotLeader(_) | Error::PeerUnavailable(_))) => {
                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}",
                        leader,
                        attempt,
                        attempts,
                        e
                    );
                    self.forget();
                    last_error = Some(e);
                }
                Err(e @ Error::LeaderInitializing(_)) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::info!("{} is recovering, retrying in {:?}", leader, delay);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let cause = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        Err(Error::leader_unavailable(format!(
            "leader unavailable after {} attempts: {}",
            attempts, cause
        )))
    }
}
