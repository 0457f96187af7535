//! Paxos variant scenarios
//!
//! Quorum arithmetic is checked against live in-process acceptors: a round
//! commits iff a strict majority, the proposer included, promises and
//! accepts.

use ordex_core::cluster::OrderingVariant;
use ordex_core::testing::LocalCluster;
use ordex_core::{Error, OrderRequest, Trade, TradeType};

fn buy(stock: &str, quantity: u64) -> OrderRequest {
    OrderRequest::new(stock, TradeType::Buy, quantity)
}

#[tokio::test]
async fn test_round_commits_with_all_replicas() {
    let cluster = LocalCluster::start(3, OrderingVariant::Paxos).unwrap();
    let leader = cluster.elect().await.unwrap();

    let order = leader.place_order(&buy("NFLX", 1)).await.unwrap();
    assert_eq!(order.transaction_number, 0);
    assert_eq!(cluster.catalog().quantity("NFLX").await.unwrap(), 99);

    cluster.settle().await;
    for replica in cluster.replicas() {
        let (_, value) = replica.acceptor().accepted().unwrap();
        assert_eq!(value, Trade::buy("NFLX", 1).unwrap());
        assert_eq!(replica.get_order(0).unwrap(), order);
    }
}

#[tokio::test]
async fn test_two_of_three_is_a_quorum() {
    let cluster = LocalCluster::start(3, OrderingVariant::Paxos).unwrap();
    let leader = cluster.elect().await.unwrap();
    cluster.kill(1).unwrap();

    let order = leader.place_order(&buy("GOOG", 2)).await.unwrap();
    assert_eq!(order.transaction_number, 0);
    assert!(cluster.replica(1).acceptor().accepted().is_none());
}

#[tokio::test]
async fn test_proposer_alone_fails_promises() {
    let cluster = LocalCluster::start(3, OrderingVariant::Paxos).unwrap();
    let leader = cluster.elect().await.unwrap();
    cluster.kill(1).unwrap();
    cluster.kill(2).unwrap();

    let err = leader.place_order(&buy("GOOG", 2)).await.unwrap_err();
    assert!(matches!(err, Error::ConsensusFailed(ref m) if m.contains("failed promises")));
    assert!(leader.store().is_empty());
    assert_eq!(leader.next_transaction(), 0);
    assert_eq!(cluster.catalog().quantity("GOOG").await.unwrap(), 100);
}

#[tokio::test]
async fn test_one_other_of_five_is_not_a_quorum() {
    let cluster = LocalCluster::start(5, OrderingVariant::Paxos).unwrap();
    let leader = cluster.elect().await.unwrap();
    assert_eq!(leader.id(), 5);
    for id in 1..=3 {
        cluster.kill(id).unwrap();
    }

    let err = leader.place_order(&buy("TSLA", 1)).await.unwrap_err();
    assert!(matches!(err, Error::ConsensusFailed(_)));

    cluster.revive(3).unwrap();
    let order = leader.place_order(&buy("TSLA", 1)).await.unwrap();
    assert_eq!(order.transaction_number, 0);
}

#[tokio::test]
async fn test_higher_promise_elsewhere_blocks_round() {
    let cluster = LocalCluster::start(3, OrderingVariant::Paxos).unwrap();
    let leader = cluster.elect().await.unwrap();

    // Both followers promised a proposal far in the future.
    let future = u64::MAX - 1;
    assert!(cluster.replica(1).prepare(future).promise);
    assert!(cluster.replica(2).prepare(future).promise);

    let err = leader.place_order(&buy("AMD", 1)).await.unwrap_err();
    assert!(matches!(err, Error::ConsensusFailed(_)));
    assert!(leader.store().is_empty());
}

#[tokio::test]
async fn test_refused_local_promise_counts_against_quorum() {
    let cluster = LocalCluster::start(3, OrderingVariant::Paxos).unwrap();
    let leader = cluster.elect().await.unwrap();
    cluster.kill(1).unwrap();

    assert!(leader.prepare(u64::MAX - 1).promise);
    let err = leader.place_order(&buy("IBM", 1)).await.unwrap_err();
    assert!(matches!(err, Error::ConsensusFailed(_)));
}

#[tokio::test]
async fn test_validation_precedes_consensus() {
    let cluster = LocalCluster::start(3, OrderingVariant::Paxos).unwrap();
    let leader = cluster.elect().await.unwrap();

    let request = OrderRequest {
        quantity: Some(serde_json::json!(0)),
        ..buy("META", 1)
    };
    let err = leader.place_order(&request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    for replica in cluster.replicas() {
        assert_eq!(replica.acceptor().promised(), 0);
    }
}

#[tokio::test]
async fn test_sequence_of_rounds_stays_gap_free() {
    let cluster = LocalCluster::start(3, OrderingVariant::Paxos).unwrap();
    cluster.elect().await.unwrap();
    let router = cluster.router();

    for quantity in 1..=4 {
        let number = router
            .place_order(&OrderRequest::new("MSFT", TradeType::Sell, quantity))
            .await
            .unwrap();
        assert_eq!(number, quantity - 1);
    }

    cluster.settle().await;
    for replica in cluster.replicas() {
        assert_eq!(replica.store().transaction_numbers(), vec![0, 1, 2, 3]);
    }
}
