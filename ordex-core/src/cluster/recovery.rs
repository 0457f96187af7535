//! Leader recovery
//!
//! Reconciles a newly promoted leader's counter and ledger against the rest
//! of the cluster. Running it twice leaves the same end state.

use super::config::Member;
use super::counter::TransactionCounter;
use super::peer::{PeerClient, with_timeout};
use super::sync::{AntiEntropy, SyncReport};
use crate::store::OrderStore;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one recovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Local max before recovery; also the anti-entropy watermark
    pub local_max: Option<u64>,
    /// Max across self and every reachable peer
    pub cluster_max: Option<u64>,
    /// Counter value after recovery
    pub next_transaction: u64,
    /// Gap repair result
    pub sync: SyncReport,
}

/// Counter and gap reconciliation for a new leader
pub struct RecoveryManager {
    peers: Arc<dyn PeerClient>,
    others: Vec<Member>,
    timeout: Duration,
}

impl RecoveryManager {
    /// Create a recovery manager for `others`
    pub fn new(peers: Arc<dyn PeerClient>, others: Vec<Member>, timeout: Duration) -> Self {
        Self {
            peers,
            others,
            timeout,
        }
    }

    /// Highest transaction number among self and reachable peers
    pub async fn cluster_max(&self, local_max: Option<u64>) -> Option<u64> {
        let queries = self.others.iter().map(|member| async move {
            let result = with_timeout(
                self.timeout,
                &member.endpoint,
                self.peers.max_transaction(&member.endpoint),
            )
            .await;
            (member, result)
        });

        let mut cluster_max = local_max;
        for (member, result) in join_all(queries).await {
            match result {
                Ok(peer_max) => {
                    tracing::debug!("{} reports max transaction {:?}", member, peer_max);
                    cluster_max = cluster_max.max(peer_max);
                }
                Err(e) => tracing::warn!("{} left out of recovery: {}", member, e),
            }
        }
        cluster_max
    }

    /// Run recovery against `store` and `counter`
    pub async fn recover(
        &self,
        store: &OrderStore,
        counter: &TransactionCounter,
        sync: &AntiEntropy,
    ) -> RecoveryReport {
        let local_max = store.max_transaction();
        let cluster_max = self.cluster_max(local_max).await;
        counter.raise_to(cluster_max.map_or(0, |m| m + 1));

        let sync = sync.fetch_missing(store, local_max).await;

        // A peer unreachable for the max query may still have answered the pull.
        let next_transaction = counter.raise_to(store.max_transaction().map_or(0, |m| m + 1));

        tracing::info!(
            "Recovery done: local max {:?}, cluster max {:?}, next transaction {}",
            local_max,
            cluster_max,
            next_transaction
        );
        RecoveryReport {
            local_max,
            cluster_max,
            next_transaction,
            sync,
        }
    }
}
