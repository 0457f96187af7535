//! Order data model
//!
//! An [`Order`] is an immutable, committed trade carrying a cluster-unique
//! transaction number. A [`Trade`] is the same payload before sequencing; it
//! is what a client asks for and what a Paxos round agrees on.
//!
//! Requests arriving from outside (clients, peers, the log file) are parsed
//! into the permissive [`OrderRequest`] / [`OrderRecord`] shapes first so that
//! a bad field is reported as a validation failure instead of a decode error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    /// Take stock out of the catalog
    Buy,
    /// Put stock back into the catalog
    Sell,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

impl FromStr for TradeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(Error::invalid_request(format!(
                "unknown trade type '{}', expected buy or sell",
                other
            ))),
        }
    }
}

/// A validated trade that has not been sequenced yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Stock symbol
    pub stock_name: String,
    /// Buy or sell
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    /// Number of shares, always positive
    pub quantity: u64,
}

impl Trade {
    /// Create a trade, checking the field invariants
    pub fn new(stock_name: impl Into<String>, trade_type: TradeType, quantity: u64) -> Result<Self> {
        let stock_name = stock_name.into();
        check_stock_name(&stock_name)?;
        if quantity == 0 {
            return Err(Error::invalid_request("quantity must be positive"));
        }
        Ok(Self {
            stock_name,
            trade_type,
            quantity,
        })
    }

    /// Shorthand for a buy
    pub fn buy(stock_name: impl Into<String>, quantity: u64) -> Result<Self> {
        Self::new(stock_name, TradeType::Buy, quantity)
    }

    /// Shorthand for a sell
    pub fn sell(stock_name: impl Into<String>, quantity: u64) -> Result<Self> {
        Self::new(stock_name, TradeType::Sell, quantity)
    }
}

/// Stock names travel as one URL path segment to the catalog, so they must be
/// non-blank and free of `/`, `?`, `#`, `%` and control characters.
pub fn check_stock_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_request("stock_name must not be empty"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_control())
    {
        return Err(Error::invalid_request(format!(
            "stock_name must not contain {:?}",
            c
        )));
    }
    Ok(())
}

/// A committed order. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Cluster-unique sequence number
    pub transaction_number: u64,
    /// Stock symbol
    pub stock_name: String,
    /// Buy or sell
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    /// Number of shares
    pub quantity: u64,
}

impl Order {
    /// Sequence a trade under the given transaction number
    pub fn new(transaction_number: u64, trade: Trade) -> Self {
        Self {
            transaction_number,
            stock_name: trade.stock_name,
            trade_type: trade.trade_type,
            quantity: trade.quantity,
        }
    }
}

/// Incoming place-order body, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub stock_name: Option<String>,
    #[serde(rename = "type", default)]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub quantity: Option<serde_json::Value>,
}

impl OrderRequest {
    /// Build a request from already-typed parts
    pub fn new(stock_name: impl Into<String>, trade_type: TradeType, quantity: u64) -> Self {
        Self {
            stock_name: Some(stock_name.into()),
            trade_type: Some(trade_type.to_string()),
            quantity: Some(quantity.into()),
        }
    }

    /// Parse a JSON body; any decode failure is an invalid request
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| Error::invalid_request(format!("malformed order body: {}", e)))
    }

    /// Validate the request shape into a [`Trade`]
    pub fn validate(&self) -> Result<Trade> {
        let stock_name = self
            .stock_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::invalid_request("stock_name is required"))?;
        let trade_type: TradeType = self
            .trade_type
            .as_deref()
            .ok_or_else(|| Error::invalid_request("type is required"))?
            .parse()?;
        let quantity = self
            .quantity
            .as_ref()
            .and_then(|q| q.as_u64())
            .ok_or_else(|| Error::invalid_request("quantity must be a positive integer"))?;
        Trade::new(stock_name, trade_type, quantity)
    }
}

/// A committed order as read from a peer or the log, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(default)]
    pub transaction_number: Option<serde_json::Value>,
    #[serde(default)]
    pub stock_name: Option<String>,
    #[serde(rename = "type", default)]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub quantity: Option<serde_json::Value>,
}

impl OrderRecord {
    /// Structural validation: every field present, non-negative integer
    /// transaction number, known trade type, positive quantity.
    pub fn into_order(self) -> Result<Order> {
        let transaction_number = self
            .transaction_number
            .as_ref()
            .and_then(|n| n.as_u64())
            .ok_or_else(|| {
                Error::invalid_request("transaction_number must be a non-negative integer")
            })?;
        let request = OrderRequest {
            stock_name: self.stock_name,
            trade_type: self.trade_type,
            quantity: self.quantity,
        };
        Ok(Order::new(transaction_number, request.validate()?))
    }
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            transaction_number: Some(order.transaction_number.into()),
            stock_name: Some(order.stock_name.clone()),
            trade_type: Some(order.trade_type.to_string()),
            quantity: Some(order.quantity.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_buy() {
        let req = OrderRequest::from_json(br#"{"stock_name":"NFLX","type":"buy","quantity":1}"#)
            .unwrap();
        let trade = req.validate().unwrap();
        assert_eq!(trade, Trade::buy("NFLX", 1).unwrap());
    }

    #[test]
    fn test_validate_rejects_hold() {
        let req = OrderRequest::new("NFLX", TradeType::Buy, 1);
        let req = OrderRequest {
            trade_type: Some("hold".into()),
            ..req
        };
        assert!(matches!(req.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_rejects_bad_quantities() {
        for quantity in [json!(0), json!(-3), json!("5"), json!(1.5)] {
            let req = OrderRequest {
                stock_name: Some("GOOG".into()),
                trade_type: Some("sell".into()),
                quantity: Some(quantity.clone()),
            };
            assert!(
                matches!(req.validate(), Err(Error::InvalidRequest(_))),
                "quantity {} should be rejected",
                quantity
            );
        }
    }

    #[test]
    fn test_validate_rejects_empty_stock() {
        let req = OrderRequest::new("  ", TradeType::Sell, 2);
        assert!(matches!(req.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_rejects_names_that_change_the_catalog_route() {
        for name in ["NFLX/../admin", "NFLX?force=1", "NFLX#x", "NF%2FLX", "NF\nLX"] {
            let req = OrderRequest::new(name, TradeType::Buy, 1);
            assert!(
                matches!(req.validate(), Err(Error::InvalidRequest(_))),
                "{:?} should be rejected",
                name
            );
        }
        assert!(OrderRequest::new("BRK.B", TradeType::Buy, 1).validate().is_ok());
    }

    #[test]
    fn test_malformed_body_is_invalid_request() {
        let err = OrderRequest::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_order_wire_shape() {
        let order = Order::new(7, Trade::sell("AMZN", 3).unwrap());
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(
            value,
            json!({"transaction_number": 7, "stock_name": "AMZN", "type": "sell", "quantity": 3})
        );
    }

    #[test]
    fn test_record_rejects_negative_transaction_number() {
        let record: OrderRecord = serde_json::from_value(
            json!({"transaction_number": -1, "stock_name": "IBM", "type": "buy", "quantity": 1}),
        )
        .unwrap();
        assert!(record.into_order().is_err());
    }
}
