//! In-process cluster for tests
//!
//! [`LocalTransport`] implements [`PeerClient`] by calling the target
//! [`Replica`] directly. Replicas can be marked down, which makes every call
//! to them fail with [`Error::PeerUnavailable`] as a dead HTTP peer would.

use crate::catalog::{Catalog, MemoryCatalog};
use crate::cluster::{
    AcceptReply, ClusterConfig, Endpoint, Health, LeaderElector, LeaderRouter, Member,
    OrderingVariant, PeerClient, Promise, Replica, ReplicateOutcome,
};
use crate::order::{Order, OrderRecord, OrderRequest, Trade};
use crate::retry::RetryConfig;
use crate::store::OrderStore;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tempfile::TempDir;

/// Direct-call transport between replicas of one process
#[derive(Default)]
pub struct LocalTransport {
    replicas: RwLock<HashMap<Endpoint, Weak<Replica>>>,
    down: RwLock<HashSet<Endpoint>>,
}

impl LocalTransport {
    /// Empty transport
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Route calls for `endpoint` to `replica`, replacing any earlier one
    pub fn register(&self, endpoint: Endpoint, replica: &Arc<Replica>) {
        self.replicas.write().insert(endpoint, Arc::downgrade(replica));
    }

    /// Mark a replica unreachable or reachable again
    pub fn set_down(&self, endpoint: &Endpoint, down: bool) {
        let mut set = self.down.write();
        if down {
            set.insert(endpoint.clone());
        } else {
            set.remove(endpoint);
        }
    }

    fn target(&self, endpoint: &Endpoint) -> Result<Arc<Replica>> {
        if self.down.read().contains(endpoint) {
            return Err(Error::peer(format!("{} is down", endpoint)));
        }
        self.replicas
            .read()
            .get(endpoint)
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::peer(format!("no replica at {}", endpoint)))
    }
}

#[async_trait]
impl PeerClient for LocalTransport {
    async fn ping(&self, peer: &Endpoint) -> Result<Health> {
        Ok(self.target(peer)?.ping())
    }

    async fn set_leader(&self, peer: &Endpoint, leader_id: u16) -> Result<()> {
        self.target(peer)?.set_leader(leader_id)
    }

    async fn place_order(&self, peer: &Endpoint, request: &OrderRequest) -> Result<u64> {
        let replica = self.target(peer)?;
        Ok(replica.place_order(request).await?.transaction_number)
    }

    async fn get_order(&self, peer: &Endpoint, transaction_number: u64) -> Result<Order> {
        self.target(peer)?.get_order(transaction_number)
    }

    async fn replicate_order(&self, peer: &Endpoint, order: &Order) -> Result<ReplicateOutcome> {
        self.target(peer)?.replicate_order(order.clone())
    }

    async fn missing_orders_after(
        &self,
        peer: &Endpoint,
        watermark: Option<u64>,
    ) -> Result<Vec<OrderRecord>> {
        let orders = self.target(peer)?.missing_orders_after(watermark);
        Ok(orders.iter().map(OrderRecord::from).collect())
    }

    async fn max_transaction(&self, peer: &Endpoint) -> Result<Option<u64>> {
        Ok(self.target(peer)?.max_transaction())
    }

    async fn prepare(&self, peer: &Endpoint, proposal_id: u64) -> Result<Promise> {
        Ok(self.target(peer)?.prepare(proposal_id))
    }

    async fn accept(&self, peer: &Endpoint, proposal_id: u64, value: &Trade) -> Result<AcceptReply> {
        Ok(self.target(peer)?.accept(proposal_id, value))
    }
}

/// Catalog that is never reachable
pub struct UnavailableCatalog;

#[async_trait]
impl Catalog for UnavailableCatalog {
    async fn quantity(&self, _stock: &str) -> Result<u64> {
        Err(Error::collaborator("catalog is down"))
    }

    async fn apply_trade(&self, _trade: &Trade) -> Result<()> {
        Err(Error::collaborator("catalog is down"))
    }
}

/// A cluster of replicas sharing one process, one catalog and a temp dir
pub struct LocalCluster {
    dir: TempDir,
    variant: OrderingVariant,
    members: Vec<Member>,
    transport: Arc<LocalTransport>,
    catalog: Arc<dyn Catalog>,
    replicas: RwLock<HashMap<u16, Arc<Replica>>>,
}

impl LocalCluster {
    /// Start `size` replicas with ids `1..=size` and the default stocks
    pub fn start(size: u16, variant: OrderingVariant) -> Result<Self> {
        Self::start_with_catalog(size, variant, Arc::new(MemoryCatalog::with_default_stocks()))
    }

    /// Start `size` replicas sharing `catalog`
    pub fn start_with_catalog(
        size: u16,
        variant: OrderingVariant,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self> {
        let dir = TempDir::new()?;
        let members = (1..=size)
            .map(|id| Member::new(id, format!("local://replica-{}", id)))
            .collect();
        let cluster = Self {
            dir,
            variant,
            members,
            transport: LocalTransport::new(),
            catalog,
            replicas: RwLock::new(HashMap::new()),
        };
        for id in 1..=size {
            cluster.boot(id)?;
        }
        Ok(cluster)
    }

    /// Cluster config of replica `id`
    pub fn config(&self, id: u16) -> ClusterConfig {
        ClusterConfig::new(id, self.members.clone())
            .with_variant(self.variant)
            .with_probe_timeout(Duration::from_millis(500))
            .with_peer_timeout(Duration::from_millis(500))
            .with_sync_timeout(Duration::from_millis(500))
    }

    /// Order log path of replica `id`
    pub fn log_path(&self, id: u16) -> PathBuf {
        self.dir.path().join(format!("order_log_{}.jsonl", id))
    }

    fn boot(&self, id: u16) -> Result<Arc<Replica>> {
        let store = OrderStore::open(self.log_path(id))?;
        let transport: Arc<dyn PeerClient> = self.transport.clone();
        let replica = Replica::new(self.config(id), store, self.catalog.clone(), transport)?;
        self.transport.register(self.endpoint(id)?, &replica);
        self.replicas.write().insert(id, replica.clone());
        Ok(replica)
    }

    fn endpoint(&self, id: u16) -> Result<Endpoint> {
        self.members
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.endpoint.clone())
            .ok_or_else(|| Error::config(format!("no replica {} in the local cluster", id)))
    }

    /// Every member
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// The shared transport
    pub fn transport(&self) -> Arc<LocalTransport> {
        self.transport.clone()
    }

    /// The shared catalog
    pub fn catalog(&self) -> Arc<dyn Catalog> {
        self.catalog.clone()
    }

    /// Replica `id`
    pub fn replica(&self, id: u16) -> Arc<Replica> {
        self.replicas
            .read()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("no replica {} in the local cluster", id))
    }

    /// All replicas in id order
    pub fn replicas(&self) -> Vec<Arc<Replica>> {
        let replicas = self.replicas.read();
        let mut all: Vec<_> = replicas.values().cloned().collect();
        all.sort_by_key(|r| r.id());
        all
    }

    /// Elector over the whole membership
    pub fn elector(&self) -> LeaderElector {
        LeaderElector::new(
            self.members.clone(),
            self.transport.clone(),
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
    }

    /// Router with the default three-attempt budget and short backoff
    pub fn router(&self) -> LeaderRouter {
        self.router_with(RetryConfig::new(3, Duration::from_millis(20)))
    }

    /// Router with a custom retry budget
    pub fn router_with(&self, retry: RetryConfig) -> LeaderRouter {
        LeaderRouter::new(
            self.elector(),
            self.transport.clone(),
            retry,
            Duration::from_millis(500),
        )
    }

    /// Elect a leader and wait for its recovery
    pub async fn elect(&self) -> Result<Arc<Replica>> {
        let leader = self.elector().elect().await?;
        let replica = self.replica(leader.id);
        replica.await_recovery().await;
        Ok(replica)
    }

    /// Make replica `id` unreachable
    pub fn kill(&self, id: u16) -> Result<()> {
        self.transport.set_down(&self.endpoint(id)?, true);
        Ok(())
    }

    /// Make replica `id` reachable again, state untouched
    pub fn revive(&self, id: u16) -> Result<()> {
        self.transport.set_down(&self.endpoint(id)?, false);
        Ok(())
    }

    /// Replace replica `id` with a fresh process over the same log, run
    /// cold-start sync and bring it back online
    pub async fn restart(&self, id: u16) -> Result<Arc<Replica>> {
        let endpoint = self.endpoint(id)?;
        self.transport.set_down(&endpoint, true);
        self.replicas.write().remove(&id);
        let replica = self.boot(id)?;
        replica.sync_on_start().await;
        self.transport.set_down(&endpoint, false);
        Ok(replica)
    }

    /// Wait for every in-flight replication push
    pub async fn settle(&self) {
        for replica in self.replicas() {
            replica.flush_replication().await;
        }
    }
}
