//! Anti-entropy: pull missing orders from peers

use super::config::Member;
use super::peer::{PeerClient, with_timeout};
use crate::Result;
use crate::ledger::Insert;
use crate::order::Order;
use crate::store::OrderStore;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// What one anti-entropy pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Watermark the pass pulled after
    pub watermark: Option<u64>,
    /// Peers that answered
    pub reachable: usize,
    /// Peers that did not
    pub unreachable: usize,
    /// Records received that failed validation
    pub rejected: usize,
    /// Orders written locally, ascending
    pub applied: Vec<u64>,
}

/// Pull-based gap repair against every peer
pub struct AntiEntropy {
    peers: Arc<dyn PeerClient>,
    others: Vec<Member>,
    timeout: Duration,
}

impl AntiEntropy {
    /// Create an anti-entropy worker for `others`
    pub fn new(peers: Arc<dyn PeerClient>, others: Vec<Member>, timeout: Duration) -> Self {
        Self {
            peers,
            others,
            timeout,
        }
    }

    /// Ask every peer for orders after `watermark` and apply the ones missing
    /// locally, in ascending order. Unreachable peers are skipped.
    pub async fn fetch_missing(&self, store: &OrderStore, watermark: Option<u64>) -> SyncReport {
        let mut report = SyncReport {
            watermark,
            ..SyncReport::default()
        };

        let merged = self.collect(watermark, &mut report).await;
        for order in merged.into_values() {
            let number = order.transaction_number;
            if watermark.is_some_and(|w| number <= w) || store.contains(number) {
                continue;
            }
            if store.commit(order) == Insert::Applied {
                report.applied.push(number);
            }
        }

        if !report.applied.is_empty() {
            tracing::info!(
                "Anti-entropy after {:?} applied {} orders ({} peers reachable, {} unreachable)",
                watermark,
                report.applied.len(),
                report.reachable,
                report.unreachable
            );
        } else {
            tracing::debug!(
                "Anti-entropy after {:?} found nothing missing ({} peers reachable)",
                watermark,
                report.reachable
            );
        }
        report
    }

    /// Query peers concurrently; first-seen wins per transaction number
    async fn collect(&self, watermark: Option<u64>, report: &mut SyncReport) -> BTreeMap<u64, Order> {
        let pulls = self.others.iter().map(|member| async move {
            let result: Result<_> = with_timeout(
                self.timeout,
                &member.endpoint,
                self.peers.missing_orders_after(&member.endpoint, watermark),
            )
            .await;
            (member, result)
        });

        let mut merged = BTreeMap::new();
        for (member, result) in join_all(pulls).await {
            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!("Anti-entropy skipped {}: {}", member, e);
                    report.unreachable += 1;
                    continue;
                }
            };
            report.reachable += 1;
            for record in records {
                match record.into_order() {
                    Ok(order) => {
                        merged.entry(order.transaction_number).or_insert(order);
                    }
                    Err(e) => {
                        tracing::warn!("Rejected record from {}: {}", member, e);
                        report.rejected += 1;
                    }
                }
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::cluster::config::Endpoint;
    use crate::cluster::directory::Role;
    use crate::cluster::peer::{AcceptReply, Health, Promise, ReplicateOutcome};
    use crate::order::{OrderRecord, OrderRequest, Trade};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Answers `missing_orders_after` with canned records; absent peers are down
    #[derive(Default)]
    struct CannedPeers {
        records: HashMap<Endpoint, Vec<OrderRecord>>,
    }

    impl CannedPeers {
        fn with(mut self, url: &str, records: Vec<OrderRecord>) -> Self {
            self.records.insert(Endpoint::new(url), records);
            self
        }
    }

    #[async_trait]
    impl PeerClient for CannedPeers {
        async fn ping(&self, _peer: &Endpoint) -> Result<Health> {
            Ok(Health {
                status: "ok".to_string(),
                replica_id: 0,
                leader_id: None,
                role: Role::Follower,
                recovery_ready: false,
            })
        }

        async fn set_leader(&self, _peer: &Endpoint, _leader_id: u16) -> Result<()> {
            Ok(())
        }

        async fn place_order(&self, peer: &Endpoint, _request: &OrderRequest) -> Result<u64> {
            Err(Error::peer(format!("{} does not take writes here", peer)))
        }

        async fn get_order(&self, peer: &Endpoint, transaction_number: u64) -> Result<Order> {
            Err(Error::not_found(format!("{} has no order {}", peer, transaction_number)))
        }

        async fn replicate_order(&self, _peer: &Endpoint, _order: &Order) -> Result<ReplicateOutcome> {
            Ok(ReplicateOutcome::Applied)
        }

        async fn missing_orders_after(
            &self,
            peer: &Endpoint,
            _watermark: Option<u64>,
        ) -> Result<Vec<OrderRecord>> {
            self.records
                .get(peer)
                .cloned()
                .ok_or_else(|| Error::peer(format!("{} refused", peer)))
        }

        async fn max_transaction(&self, _peer: &Endpoint) -> Result<Option<u64>> {
            Ok(None)
        }

        async fn prepare(&self, _peer: &Endpoint, proposal_id: u64) -> Result<Promise> {
            Ok(Promise {
                promise: false,
                promised_id: proposal_id,
                accepted_id: None,
                accepted_value: None,
            })
        }

        async fn accept(&self, _peer: &Endpoint, proposal_id: u64, _value: &Trade) -> Result<AcceptReply> {
            Ok(AcceptReply {
                accepted: false,
                promised_id: proposal_id,
            })
        }
    }

    fn record(order: &Order) -> OrderRecord {
        OrderRecord::from(order)
    }

    fn anti_entropy(peers: CannedPeers, urls: &[&str]) -> AntiEntropy {
        let others = urls
            .iter()
            .enumerate()
            .map(|(i, url)| Member::new(i as u16 + 1, *url))
            .collect();
        AntiEntropy::new(Arc::new(peers), others, Duration::from_secs(1))
    }

    fn store(dir: &TempDir) -> OrderStore {
        OrderStore::open(dir.path().join("order_log_3.jsonl")).unwrap()
    }

    #[tokio::test]
    async fn test_first_listed_peer_wins_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let first = Order::new(0, Trade::buy("NFLX", 1).unwrap());
        let second = Order::new(0, Trade::sell("AMD", 7).unwrap());
        let peers = CannedPeers::default()
            .with("http://a:1", vec![record(&first)])
            .with("http://b:2", vec![record(&second)]);

        let report = anti_entropy(peers, &["http://a:1", "http://b:2"])
            .fetch_missing(&store, None)
            .await;

        assert_eq!(report.applied, vec![0]);
        assert_eq!(report.reachable, 2);
        assert_eq!(store.get(0).unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_only_numbers_above_watermark_are_applied() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let local = Order::new(1, Trade::buy("IBM", 2).unwrap());
        store.commit(local.clone());

        let behind = Order::new(0, Trade::sell("GOOG", 1).unwrap());
        let clash = Order::new(1, Trade::sell("TSLA", 4).unwrap());
        let ahead = Order::new(3, Trade::buy("MSFT", 5).unwrap());
        let peers = CannedPeers::default().with(
            "http://a:1",
            vec![record(&behind), record(&clash), record(&ahead)],
        );

        let report = anti_entropy(peers, &["http://a:1"])
            .fetch_missing(&store, Some(1))
            .await;

        assert_eq!(report.watermark, Some(1));
        assert_eq!(report.applied, vec![3]);
        assert_eq!(store.transaction_numbers(), vec![1, 3]);
        assert_eq!(store.get(1).unwrap(), Some(local));
    }

    #[tokio::test]
    async fn test_malformed_records_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let good = Order::new(2, Trade::buy("AMZN", 1).unwrap());
        let hold = OrderRecord {
            trade_type: Some("hold".to_string()),
            ..record(&Order::new(4, Trade::buy("AMZN", 1).unwrap()))
        };
        let negative = OrderRecord {
            transaction_number: Some(json!(-1)),
            ..record(&good)
        };
        let peers = CannedPeers::default().with(
            "http://a:1",
            vec![OrderRecord::default(), hold, negative, record(&good)],
        );

        let report = anti_entropy(peers, &["http://a:1"])
            .fetch_missing(&store, None)
            .await;

        assert_eq!(report.rejected, 3);
        assert_eq!(report.applied, vec![2]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_peers_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let order = Order::new(0, Trade::sell("META", 2).unwrap());
        let peers = CannedPeers::default().with("http://b:2", vec![record(&order)]);

        let report = anti_entropy(peers, &["http://a:1", "http://b:2"])
            .fetch_missing(&store, None)
            .await;

        assert_eq!(report.unreachable, 1);
        assert_eq!(report.reachable, 1);
        assert_eq!(report.applied, vec![0]);
    }
}
