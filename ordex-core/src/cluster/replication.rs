//! Asynchronous push replication
//!
//! Each committed order is pushed to every follower on its own task. The
//! client response never waits for them; followers apply idempotently, so
//! at-least-once delivery is enough.

use super::config::Member;
use super::peer::{PeerClient, ReplicateOutcome, with_timeout};
use crate::order::Order;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fire-and-forget pusher of committed orders
pub struct Replicator {
    peers: Arc<dyn PeerClient>,
    followers: Vec<Member>,
    timeout: Duration,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl Replicator {
    /// Create a replicator towards `followers`
    pub fn new(peers: Arc<dyn PeerClient>, followers: Vec<Member>, timeout: Duration) -> Self {
        Self {
            peers,
            followers,
            timeout,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Spawn one push per follower and return immediately
    pub fn push(&self, order: &Order) {
        let mut handles = Vec::with_capacity(self.followers.len());
        for follower in &self.followers {
            let peers = self.peers.clone();
            let follower = follower.clone();
            let order = order.clone();
            let timeout = self.timeout;
            handles.push(tokio::spawn(async move {
                let result = with_timeout(
                    timeout,
                    &follower.endpoint,
                    peers.replicate_order(&follower.endpoint, &order),
                )
                .await;
                match result {
                    Ok(ReplicateOutcome::Applied) => {
                        tracing::debug!("Replicated order {} to {}", order.transaction_number, follower)
                    }
                    Ok(ReplicateOutcome::Duplicate) => tracing::debug!(
                        "{} already had order {}",
                        follower,
                        order.transaction_number
                    ),
                    Err(e) => tracing::error!(
                        "Failed to replicate order {} to {}: {}",
                        order.transaction_number,
                        follower,
                        e
                    ),
                }
            }));
        }

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.extend(handles);
    }

    /// Wait for every push spawned so far
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.in_flight.lock());
        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!("Replication task panicked: {}", e);
            }
        }
    }
}
