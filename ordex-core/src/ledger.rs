//! In-memory ledger
//!
//! Ordered, deduplicated mirror of the order log keyed by transaction
//! number. It is the fast path for reads and the dedup point for writes.

use crate::Result;
use crate::order::Order;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Outcome of offering an order to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// The order was new and is now stored
    Applied,
    /// An order with that transaction number was already present
    Duplicate,
}

/// In-memory mirror of the log
#[derive(Default)]
pub struct Ledger {
    orders: Mutex<BTreeMap<u64, Order>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the ledger from replayed orders
    pub fn from_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let mut map = BTreeMap::new();
        for order in orders {
            map.entry(order.transaction_number).or_insert(order);
        }
        Self {
            orders: Mutex::new(map),
        }
    }

    /// Insert `order` unless its transaction number is present.
    ///
    /// `persist` runs under the ledger lock, only for new orders, before the
    /// order becomes visible; a duplicate never reaches the log.
    pub fn insert_with<F>(&self, order: Order, persist: F) -> Result<Insert>
    where
        F: FnOnce(&Order) -> Result<()>,
    {
        let mut orders = self.orders.lock();
        if orders.contains_key(&order.transaction_number) {
            return Ok(Insert::Duplicate);
        }
        persist(&order)?;
        orders.insert(order.transaction_number, order);
        Ok(Insert::Applied)
    }

    /// Point lookup
    pub fn get(&self, transaction_number: u64) -> Option<Order> {
        self.orders.lock().get(&transaction_number).cloned()
    }

    /// Whether the transaction number is known
    pub fn contains(&self, transaction_number: u64) -> bool {
        self.orders.lock().contains_key(&transaction_number)
    }

    /// Highest transaction number, `None` when empty
    pub fn max_transaction(&self) -> Option<u64> {
        self.orders.lock().keys().next_back().copied()
    }

    /// All orders strictly after `watermark`, ascending.
    /// `None` means "from the beginning".
    pub fn orders_after(&self, watermark: Option<u64>) -> Vec<Order> {
        let orders = self.orders.lock();
        match watermark {
            None => orders.values().cloned().collect(),
            Some(w) => orders
                .range(w.saturating_add(1)..)
                .filter(|(n, _)| **n > w)
                .map(|(_, o)| o.clone())
                .collect(),
        }
    }

    /// Number of orders held
    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    /// Whether the ledger holds no orders
    pub fn is_empty(&self) -> bool {
        self.orders.lock().is_empty()
    }

    /// Sorted transaction numbers
    pub fn transaction_numbers(&self) -> Vec<u64> {
        self.orders.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::order::Trade;

    fn order(n: u64) -> Order {
        Order::new(n, Trade::sell("TSLA", 1).unwrap())
    }

    #[test]
    fn test_insert_dedupes() {
        let ledger = Ledger::new();
        assert_eq!(ledger.insert_with(order(3), |_| Ok(())).unwrap(), Insert::Applied);
        assert_eq!(ledger.insert_with(order(3), |_| Ok(())).unwrap(), Insert::Duplicate);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_insert_with_skips_persist_for_duplicates() {
        let ledger = Ledger::from_orders([order(1)]);
        let mut calls = 0;
        let outcome = ledger
            .insert_with(order(1), |_| {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(outcome, Insert::Duplicate);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_insert_with_propagates_persist_failure() {
        let ledger = Ledger::new();
        let err = ledger
            .insert_with(order(1), |_| Err(Error::internal("disk")))
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_orders_after_watermark() {
        let ledger = Ledger::from_orders([order(4), order(0), order(2), order(1)]);
        let after: Vec<u64> = ledger
            .orders_after(Some(1))
            .iter()
            .map(|o| o.transaction_number)
            .collect();
        assert_eq!(after, vec![2, 4]);
        assert_eq!(ledger.orders_after(None).len(), 4);
        assert!(ledger.orders_after(Some(u64::MAX)).is_empty());
    }

    #[test]
    fn test_max_transaction() {
        assert_eq!(Ledger::new().max_transaction(), None);
        assert_eq!(
            Ledger::from_orders([order(7), order(2)]).max_transaction(),
            Some(7)
        );
    }
}
