//! Order store: the durable log and the in-memory ledger kept in step
//!
//! Lock order is always ledger, then log. A failed disk write is logged and
//! the in-memory copy stays authoritative for the life of the process.

use crate::Result;
use crate::ledger::{Insert, Ledger};
use crate::log::OrderLog;
use crate::order::Order;
use std::path::Path;

/// Log plus ledger for one replica
pub struct OrderStore {
    log: OrderLog,
    ledger: Ledger,
}

impl OrderStore {
    /// Open the log at `path` and rebuild the ledger by replay
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let log = OrderLog::open(path)?;
        let replay = log.replay()?;
        let ledger = Ledger::from_orders(replay.orders);
        Ok(Self { log, ledger })
    }

    /// Commit an order locally: dedupe, persist, insert
    pub fn commit(&self, order: Order) -> Insert {
        let log = &self.log;
        let outcome = self.ledger.insert_with(order, |order| {
            if let Err(e) = log.append(order) {
                tracing::error!(
                    "Failed to persist order {} to {}: {}",
                    order.transaction_number,
                    log.path().display(),
                    e
                );
            }
            Ok(())
        });
        // The persist closure never fails, so neither does the insert.
        outcome.unwrap_or(Insert::Applied)
    }

    /// Point lookup, ledger first, then a scan of the log file
    pub fn get(&self, transaction_number: u64) -> Result<Option<Order>> {
        if let Some(order) = self.ledger.get(transaction_number) {
            return Ok(Some(order));
        }
        self.log.find(transaction_number)
    }

    /// Whether the transaction number is already present
    pub fn contains(&self, transaction_number: u64) -> bool {
        self.ledger.contains(transaction_number)
    }

    /// Highest known transaction number
    pub fn max_transaction(&self) -> Option<u64> {
        self.ledger.max_transaction()
    }

    /// Orders strictly after `watermark`, ascending
    pub fn orders_after(&self, watermark: Option<u64>) -> Vec<Order> {
        self.ledger.orders_after(watermark)
    }

    /// Number of committed orders
    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    /// Whether nothing has been committed
    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Sorted transaction numbers
    pub fn transaction_numbers(&self) -> Vec<u64> {
        self.ledger.transaction_numbers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Trade;
    use tempfile::TempDir;

    #[test]
    fn test_commit_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("order_log_3.jsonl");
        {
            let store = OrderStore::open(&path).unwrap();
            assert_eq!(store.commit(Order::new(0, Trade::buy("MSFT", 2).unwrap())), Insert::Applied);
            assert_eq!(store.commit(Order::new(1, Trade::sell("MSFT", 1).unwrap())), Insert::Applied);
            assert_eq!(store.commit(Order::new(1, Trade::sell("MSFT", 1).unwrap())), Insert::Duplicate);
        }

        let store = OrderStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.max_transaction(), Some(1));
        assert_eq!(store.get(0).unwrap().unwrap().stock_name, "MSFT");
    }

    #[test]
    fn test_disk_failure_keeps_memory_copy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("order_log_2.jsonl");
        let store = OrderStore::open(&path).unwrap();
        store.log.make_read_only().unwrap();

        let order = Order::new(0, Trade::sell("AMZN", 3).unwrap());
        assert_eq!(store.commit(order.clone()), Insert::Applied);
        assert_eq!(store.get(0).unwrap(), Some(order.clone()));
        assert_eq!(store.max_transaction(), Some(0));
        assert_eq!(store.commit(order), Insert::Duplicate);

        // Nothing reached the disk
        assert!(OrderStore::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_commit_not_written_twice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("order_log_1.jsonl");
        let store = OrderStore::open(&path).unwrap();
        let order = Order::new(4, Trade::buy("META", 1).unwrap());
        store.commit(order.clone());
        store.commit(order);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
