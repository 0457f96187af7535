//! Replica node
//!
//! [`Replica`] owns every piece of per-replica state and implements the
//! server side of the RPC surface. Transports (HTTP handlers, the in-process
//! test cluster) only decode requests and call into it.

use super::config::{ClusterConfig, Member, OrderingVariant};
use super::counter::TransactionCounter;
use super::directory::{DirectoryView, LeaderDirectory, Transition};
use super::paxos::{Acceptor, Proposer};
use super::peer::{AcceptReply, Health, PeerClient, Promise, ReplicateOutcome};
use super::recovery::{RecoveryManager, RecoveryReport};
use super::replication::Replicator;
use super::sync::{AntiEntropy, SyncReport};
use crate::catalog::Catalog;
use crate::ledger::Insert;
use crate::order::{Order, OrderRequest, Trade, TradeType};
use crate::store::OrderStore;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One replica of the order ledger
pub struct Replica {
    config: ClusterConfig,
    store: OrderStore,
    catalog: Arc<dyn Catalog>,
    directory: LeaderDirectory,
    counter: TransactionCounter,
    acceptor: Acceptor,
    proposer: Proposer,
    replicator: Replicator,
    anti_entropy: AntiEntropy,
    recovery: RecoveryManager,
    recovery_task: Mutex<Option<JoinHandle<()>>>,
}

impl Replica {
    /// Assemble a replica over an already replayed store
    pub fn new(
        config: ClusterConfig,
        store: OrderStore,
        catalog: Arc<dyn Catalog>,
        peers: Arc<dyn PeerClient>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let others = config.peers();
        let counter = TransactionCounter::after(store.max_transaction());

        tracing::info!(
            "Replica {} starting ({} variant, {} orders, next transaction {})",
            config.replica_id,
            config.variant,
            store.len(),
            counter.peek()
        );

        Ok(Arc::new(Self {
            directory: LeaderDirectory::new(config.replica_id),
            acceptor: Acceptor::new(),
            proposer: Proposer::new(
                config.replica_id,
                peers.clone(),
                others.clone(),
                config.quorum(),
                config.peer_timeout,
            ),
            replicator: Replicator::new(peers.clone(), others.clone(), config.peer_timeout),
            anti_entropy: AntiEntropy::new(peers.clone(), others.clone(), config.sync_timeout),
            recovery: RecoveryManager::new(peers, others, config.peer_timeout),
            recovery_task: Mutex::new(None),
            counter,
            store,
            catalog,
            config,
        }))
    }

    /// Replica id
    pub fn id(&self) -> u16 {
        self.config.replica_id
    }

    /// Cluster configuration
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Local order store
    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    /// Leader belief snapshot
    pub fn directory(&self) -> DirectoryView {
        self.directory.view()
    }

    /// Value the next assigned transaction number will take
    pub fn next_transaction(&self) -> u64 {
        self.counter.peek()
    }

    /// Local Paxos acceptor
    pub fn acceptor(&self) -> &Acceptor {
        &self.acceptor
    }

    /// Liveness probe
    pub fn ping(&self) -> Health {
        let view = self.directory.view();
        Health {
            status: "ok".to_string(),
            replica_id: self.id(),
            leader_id: view.leader,
            role: view.role,
            recovery_ready: view.recovery_ready,
        }
    }

    /// Handle a leader-change notification. Promotion spawns recovery in the
    /// background; writes are refused until it finishes.
    pub fn set_leader(self: &Arc<Self>, leader_id: u16) -> Result<()> {
        let leader = self.config.member(leader_id).cloned().ok_or_else(|| {
            Error::invalid_request(format!("replica {} is not a cluster member", leader_id))
        })?;

        match self.directory.observe(leader_id) {
            Transition::BecameLeader { epoch } => {
                tracing::info!("Replica {} promoted to leader (epoch {})", self.id(), epoch);
                let replica = Arc::clone(self);
                let task = tokio::spawn(async move {
                    replica.recover(epoch).await;
                });
                if let Some(previous) = self.recovery_task.lock().replace(task) {
                    if !previous.is_finished() {
                        tracing::debug!("Earlier recovery still running, its epoch is stale");
                    }
                }
            }
            Transition::StillLeader => {
                tracing::debug!("Replica {} already leads, notification ignored", self.id());
            }
            Transition::SteppedDown { epoch } => {
                tracing::info!(
                    "Replica {} stepped down, now following {} (epoch {})",
                    self.id(),
                    leader,
                    epoch
                );
            }
            Transition::Follower { epoch } => {
                tracing::info!("Replica {} following {} (epoch {})", self.id(), leader, epoch);
            }
        }
        Ok(())
    }

    /// Run recovery for `epoch` and mark the replica ready if the epoch is
    /// still current when it finishes.
    pub async fn recover(&self, epoch: u64) -> RecoveryReport {
        let report = self
            .recovery
            .recover(&self.store, &self.counter, &self.anti_entropy)
            .await;
        if self.directory.mark_ready(epoch) {
            tracing::info!(
                "Replica {} ready to accept writes (next transaction {})",
                self.id(),
                report.next_transaction
            );
        } else {
            tracing::info!(
                "Recovery for epoch {} finished after leadership changed, not marking ready",
                epoch
            );
        }
        report
    }

    /// Wait for the most recently spawned recovery
    pub async fn await_recovery(&self) {
        let task = self.recovery_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Recovery task of replica {} failed: {}", self.id(), e);
            }
        }
    }

    /// Wait for every replication push spawned so far
    pub async fn flush_replication(&self) {
        self.replicator.flush().await;
    }

    /// Cold-start synchronization: pull everything after the local max
    pub async fn sync_on_start(&self) -> SyncReport {
        let report = self
            .anti_entropy
            .fetch_missing(&self.store, self.store.max_transaction())
            .await;
        self.counter
            .raise_to(self.store.max_transaction().map_or(0, |m| m + 1));
        report
    }

    /// Client write path
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order> {
        let trade = request.validate()?;
        self.directory.write_gate()?;

        if trade.trade_type == TradeType::Buy {
            self.check_availability(&trade).await?;
        }

        if self.config.variant == OrderingVariant::Paxos {
            self.proposer.propose(&self.acceptor, &trade).await?;
        }

        self.catalog.apply_trade(&trade).await?;

        let order = self.counter.assign(|number| {
            let order = Order::new(number, trade.clone());
            match self.store.commit(order.clone()) {
                Insert::Applied => Some(order),
                Insert::Duplicate => {
                    tracing::warn!(
                        "Transaction {} already taken locally, moving to the next number",
                        number
                    );
                    None
                }
            }
        });

        tracing::info!(
            "Committed order {}: {} {} x{}",
            order.transaction_number,
            order.trade_type,
            order.stock_name,
            order.quantity
        );
        self.replicator.push(&order);
        Ok(order)
    }

    async fn check_availability(&self, trade: &Trade) -> Result<()> {
        let available = self.catalog.quantity(&trade.stock_name).await?;
        if available < trade.quantity {
            return Err(Error::InsufficientStock(format!(
                "{} has {} available, {} requested",
                trade.stock_name, available, trade.quantity
            )));
        }
        Ok(())
    }

    /// Point lookup on this replica only
    pub fn get_order(&self, transaction_number: u64) -> Result<Order> {
        self.store.get(transaction_number)?.ok_or_else(|| {
            Error::not_found(format!(
                "order {} not found on replica {}",
                transaction_number,
                self.id()
            ))
        })
    }

    /// Apply an order pushed by the leader
    pub fn replicate_order(&self, order: Order) -> Result<ReplicateOutcome> {
        if self.directory.is_leader() {
            return Err(Error::ReplicationConflict(format!(
                "replica {} is leader and does not accept replicated order {}",
                self.id(),
                order.transaction_number
            )));
        }
        let number = order.transaction_number;
        let outcome = ReplicateOutcome::from(self.store.commit(order));
        tracing::debug!("Replicated order {} applied as {:?}", number, outcome);
        Ok(outcome)
    }

    /// Orders strictly after `watermark`, ascending
    pub fn missing_orders_after(&self, watermark: Option<u64>) -> Vec<Order> {
        self.store.orders_after(watermark)
    }

    /// Local max transaction number
    pub fn max_transaction(&self) -> Option<u64> {
        self.store.max_transaction()
    }

    /// Paxos phase 1 handler
    pub fn prepare(&self, proposal_id: u64) -> Promise {
        self.acceptor.prepare(proposal_id)
    }

    /// Paxos phase 2 handler
    pub fn accept(&self, proposal_id: u64, value: &Trade) -> AcceptReply {
        self.acceptor.accept(proposal_id, value)
    }

    /// Other members of the cluster
    pub fn peers(&self) -> Vec<Member> {
        self.config.peers()
    }
}
