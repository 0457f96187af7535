//! Ordex Server - HTTP API of one order replica
//!
//! Provides REST endpoints for:
//! - GET /ping - Liveness, role and readiness
//! - POST /set_leader - Leader-change notification
//! - POST /orders - Place an order (leader only)
//! - GET /orders/{n} - Look up a committed order
//! - POST /replicate_order - Apply an order pushed by the leader
//! - GET /get_missing_orders/{n} - Orders after a watermark
//! - GET /max_transaction - Highest stored transaction number
//! - POST /paxos/prepare - Paxos phase 1
//! - POST /paxos/accept - Paxos phase 2

use ordex_core::cluster::Replica;
use std::sync::Arc;

pub mod api;
pub mod config;

/// Ordex server state
#[derive(Clone)]
pub struct OrderServer {
    /// The replica served by this process
    pub replica: Arc<Replica>,
}

impl OrderServer {
    /// Create a new server around a replica
    pub fn new(replica: Arc<Replica>) -> Self {
        Self { replica }
    }
}
