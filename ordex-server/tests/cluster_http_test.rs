//! Three replicas over real sockets, talking through `HttpPeerClient`

use ordex_core::catalog::{Catalog, MemoryCatalog};
use ordex_core::cluster::{
    ClusterConfig, LeaderElector, LeaderRouter, Member, OrderingVariant, PeerClient, Replica,
};
use ordex_core::retry::RetryConfig;
use ordex_core::store::OrderStore;
use ordex_core::{OrderRequest, TradeType};
use ordex_protocol::HttpPeerClient;
use ordex_server::{OrderServer, api};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(2);

struct HttpCluster {
    _dir: TempDir,
    members: Vec<Member>,
    replicas: Vec<Arc<Replica>>,
    peers: Arc<dyn PeerClient>,
}

impl HttpCluster {
    async fn start(size: u16, variant: OrderingVariant) -> Self {
        let dir = TempDir::new().unwrap();
        let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::with_default_stocks());
        let peers: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new(TIMEOUT).unwrap());

        let mut listeners = Vec::new();
        let mut members = Vec::new();
        for id in 1..=size {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            members.push(Member::new(id, format!("http://{}", addr)));
            listeners.push(listener);
        }

        let mut replicas = Vec::new();
        for (listener, member) in listeners.into_iter().zip(&members) {
            let config = ClusterConfig::new(member.id, members.clone())
                .with_variant(variant)
                .with_probe_timeout(TIMEOUT)
                .with_peer_timeout(TIMEOUT)
                .with_sync_timeout(TIMEOUT);
            let store =
                OrderStore::open(dir.path().join(format!("order_log_{}.jsonl", member.id))).unwrap();
            let replica = Replica::new(config, store, catalog.clone(), peers.clone()).unwrap();
            let app = api::router(Arc::new(OrderServer::new(replica.clone())));
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            replicas.push(replica);
        }

        Self {
            _dir: dir,
            members,
            replicas,
            peers,
        }
    }

    fn router(&self) -> LeaderRouter {
        let elector = LeaderElector::new(self.members.clone(), self.peers.clone(), TIMEOUT, TIMEOUT);
        LeaderRouter::new(
            elector,
            self.peers.clone(),
            RetryConfig::new(5, Duration::from_millis(50)),
            TIMEOUT,
        )
    }

    fn replica(&self, id: u16) -> &Arc<Replica> {
        &self.replicas[usize::from(id) - 1]
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_primary_backup_over_http() {
    let cluster = HttpCluster::start(3, OrderingVariant::PrimaryBackup).await;
    let router = cluster.router();

    let expected = cluster
        .members
        .iter()
        .max_by(|a, b| a.endpoint.cmp(&b.endpoint))
        .unwrap()
        .clone();
    let leader = router.elect().await.unwrap();
    assert_eq!(leader, expected);
    cluster.replica(leader.id).await_recovery().await;

    let first = router
        .place_order(&OrderRequest::new("NFLX", TradeType::Buy, 1))
        .await
        .unwrap();
    let second = router
        .place_order(&OrderRequest::new("IBM", TradeType::Sell, 4))
        .await
        .unwrap();
    assert_eq!((first, second), (0, 1));

    cluster.replica(leader.id).flush_replication().await;
    for member in &cluster.members {
        let order = cluster.peers.get_order(&member.endpoint, 1).await.unwrap();
        assert_eq!(order.stock_name, "IBM");
        assert_eq!(
            cluster.peers.max_transaction(&member.endpoint).await.unwrap(),
            Some(1)
        );
    }

    let missing = cluster
        .peers
        .missing_orders_after(&cluster.members[0].endpoint, None)
        .await
        .unwrap();
    assert_eq!(missing.len(), 2);

    let order = router.get_order(0).await.unwrap();
    assert_eq!(order.stock_name, "NFLX");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_follower_rejection_crosses_the_wire() {
    let cluster = HttpCluster::start(3, OrderingVariant::PrimaryBackup).await;
    let router = cluster.router();
    let leader = router.elect().await.unwrap();

    let follower = cluster
        .members
        .iter()
        .find(|m| m.id != leader.id)
        .unwrap();
    let err = cluster
        .peers
        .place_order(&follower.endpoint, &OrderRequest::new("NFLX", TradeType::Buy, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ordex_core::Error::NotLeader(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paxos_over_http() {
    let cluster = HttpCluster::start(3, OrderingVariant::Paxos).await;
    let router = cluster.router();
    let leader = router.elect().await.unwrap();
    cluster.replica(leader.id).await_recovery().await;

    let number = router
        .place_order(&OrderRequest::new("AMD", TradeType::Buy, 2))
        .await
        .unwrap();
    assert_eq!(number, 0);

    for replica in &cluster.replicas {
        let (_, value) = replica.acceptor().accepted().unwrap();
        assert_eq!(value.stock_name, "AMD");
    }
}
