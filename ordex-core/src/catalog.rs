//! Catalog collaborator
//!
//! The ledger consults the catalog before committing a trade: it reads the
//! current quantity and applies the buy/sell delta. The two calls are each
//! transactional on the catalog side but are not atomic with the ledger
//! commit.

use crate::order::{Trade, TradeType};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Catalog view of one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    /// Stock symbol
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Shares available
    pub quantity: u64,
}

/// Stock catalog consumed by the write path
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Read the current quantity of `stock`
    async fn quantity(&self, stock: &str) -> Result<u64>;

    /// Apply the buy/sell delta of `trade`
    async fn apply_trade(&self, trade: &Trade) -> Result<()>;
}

/// Stocks the catalog starts with when no snapshot exists
pub const DEFAULT_STOCKS: [(&str, f64); 10] = [
    ("APPL", 150.0),
    ("GOOG", 280.0),
    ("MSFT", 200.0),
    ("AMZN", 350.0),
    ("TSLA", 345.0),
    ("META", 600.0),
    ("NFLX", 700.0),
    ("NVDA", 380.0),
    ("AMD", 990.0),
    ("IBM", 100.0),
];

/// Starting quantity of every default stock
pub const DEFAULT_QUANTITY: u64 = 100;

/// In-process catalog behind a reader/writer lock
pub struct MemoryCatalog {
    stocks: RwLock<HashMap<String, StockQuote>>,
    invalidations: Option<mpsc::UnboundedSender<String>>,
}

impl MemoryCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self {
            stocks: RwLock::new(HashMap::new()),
            invalidations: None,
        }
    }

    /// Catalog seeded with the default stocks
    pub fn with_default_stocks() -> Self {
        let catalog = Self::new();
        for (name, price) in DEFAULT_STOCKS {
            catalog.insert(name, price, DEFAULT_QUANTITY);
        }
        catalog
    }

    /// Emit the stock name on `sender` after every mutation
    pub fn with_invalidation(mut self, sender: mpsc::UnboundedSender<String>) -> Self {
        self.invalidations = Some(sender);
        self
    }

    /// Add or replace a stock
    pub fn insert(&self, name: &str, price: f64, quantity: u64) {
        self.stocks.write().insert(
            name.to_string(),
            StockQuote {
                name: name.to_string(),
                price,
                quantity,
            },
        );
    }

    /// Look up a stock
    pub fn lookup(&self, name: &str) -> Option<StockQuote> {
        self.stocks.read().get(name).cloned()
    }

    fn notify(&self, stock: &str) {
        if let Some(tx) = &self.invalidations {
            if tx.send(stock.to_string()).is_err() {
                tracing::debug!("Invalidation receiver dropped, {} not announced", stock);
            }
        }
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn quantity(&self, stock: &str) -> Result<u64> {
        self.lookup(stock)
            .map(|s| s.quantity)
            .ok_or_else(|| Error::not_found(format!("no stock named {}", stock)))
    }

    async fn apply_trade(&self, trade: &Trade) -> Result<()> {
        {
            let mut stocks = self.stocks.write();
            let stock = stocks
                .get_mut(&trade.stock_name)
                .ok_or_else(|| Error::not_found(format!("no stock named {}", trade.stock_name)))?;
            stock.quantity = match trade.trade_type {
                TradeType::Buy => stock.quantity.checked_sub(trade.quantity).ok_or_else(|| {
                    Error::InsufficientStock(format!(
                        "{} has {} available, {} requested",
                        trade.stock_name, stock.quantity, trade.quantity
                    ))
                })?,
                TradeType::Sell => stock.quantity.saturating_add(trade.quantity),
            };
        }
        tracing::debug!("Catalog updated for {}", trade.stock_name);
        self.notify(&trade.stock_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buy_and_sell_adjust_quantity() {
        let catalog = MemoryCatalog::with_default_stocks();
        catalog.apply_trade(&Trade::buy("NFLX", 1).unwrap()).await.unwrap();
        assert_eq!(catalog.quantity("NFLX").await.unwrap(), 99);
        catalog.apply_trade(&Trade::sell("NFLX", 5).unwrap()).await.unwrap();
        assert_eq!(catalog.quantity("NFLX").await.unwrap(), 104);
    }

    #[tokio::test]
    async fn test_buy_cannot_go_negative() {
        let catalog = MemoryCatalog::new();
        catalog.insert("IBM", 100.0, 2);
        let err = catalog
            .apply_trade(&Trade::buy("IBM", 3).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientStock(_)));
        assert_eq!(catalog.quantity("IBM").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_stock() {
        let catalog = MemoryCatalog::new();
        assert!(matches!(catalog.quantity("XYZ").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mutation_emits_invalidation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let catalog = MemoryCatalog::with_default_stocks().with_invalidation(tx);
        catalog.apply_trade(&Trade::sell("GOOG", 1).unwrap()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("GOOG"));
    }
}
