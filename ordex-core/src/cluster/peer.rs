//! Replica-to-replica RPC surface
//!
//! [`PeerClient`] is the seam between the cluster logic and the transport.
//! The server crate implements it over HTTP; [`crate::testing`] implements it
//! in process. Every call a replica makes to another one goes through it,
//! wrapped in [`with_timeout`] so one slow peer cannot stall the others.

use super::config::Endpoint;
use super::directory::Role;
use crate::ledger::Insert;
use crate::order::{Order, OrderRecord, OrderRequest, Trade};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Liveness probe reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// `"ok"` when the replica is serving
    pub status: String,
    pub replica_id: u16,
    /// Leader this replica currently believes in
    pub leader_id: Option<u16>,
    pub role: Role,
    pub recovery_ready: bool,
}

impl Health {
    /// Whether the probe counts as healthy
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

/// Phase 1 reply of an acceptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promise {
    /// Whether the acceptor promised the proposal
    pub promise: bool,
    /// The acceptor's promise after handling the request
    pub promised_id: u64,
    /// Proposal of the previously accepted value, if any
    pub accepted_id: Option<u64>,
    /// Previously accepted value, if any
    pub accepted_value: Option<Trade>,
}

/// Phase 2 reply of an acceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptReply {
    pub accepted: bool,
    pub promised_id: u64,
}

/// Result of a replicate call; a duplicate is a success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicateOutcome {
    Applied,
    Duplicate,
}

impl From<Insert> for ReplicateOutcome {
    fn from(insert: Insert) -> Self {
        match insert {
            Insert::Applied => Self::Applied,
            Insert::Duplicate => Self::Duplicate,
        }
    }
}

/// Client side of the per-replica RPC surface
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Liveness probe
    async fn ping(&self, peer: &Endpoint) -> Result<Health>;

    /// Deliver the elected leader's id
    async fn set_leader(&self, peer: &Endpoint, leader_id: u16) -> Result<()>;

    /// Submit an order to the believed leader; returns the assigned number
    async fn place_order(&self, peer: &Endpoint, request: &OrderRequest) -> Result<u64>;

    /// Point lookup
    async fn get_order(&self, peer: &Endpoint, transaction_number: u64) -> Result<Order>;

    /// Push a committed order to a follower
    async fn replicate_order(&self, peer: &Endpoint, order: &Order) -> Result<ReplicateOutcome>;

    /// Orders strictly after `watermark`, unvalidated
    async fn missing_orders_after(
        &self,
        peer: &Endpoint,
        watermark: Option<u64>,
    ) -> Result<Vec<OrderRecord>>;

    /// Highest transaction number the peer holds
    async fn max_transaction(&self, peer: &Endpoint) -> Result<Option<u64>>;

    /// Paxos phase 1
    async fn prepare(&self, peer: &Endpoint, proposal_id: u64) -> Result<Promise>;

    /// Paxos phase 2
    async fn accept(&self, peer: &Endpoint, proposal_id: u64, value: &Trade) -> Result<AcceptReply>;
}

/// Bound a peer call; an expired call is a [`Error::PeerUnavailable`]
pub async fn with_timeout<T, F>(limit: Duration, peer: &Endpoint, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::peer(format!("{} did not answer within {:?}", peer, limit))),
    }
}
