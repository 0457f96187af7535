//! HTTP client of the catalog service
//!
//! The catalog answers with bare JSON bodies (`{name, price, quantity}`),
//! not with the replica envelope, so only the status decides the error.

use crate::rest::RestClient;
use crate::wire::CatalogTrade;
use async_trait::async_trait;
use ordex_core::catalog::{Catalog, StockQuote};
use ordex_core::order::check_stock_name;
use ordex_core::{Error, Result, Trade};
use reqwest::StatusCode;
use std::time::Duration;

/// Default catalog request timeout
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(5);

/// Remote catalog
pub struct HttpCatalog {
    rest: RestClient,
}

impl HttpCatalog {
    /// Catalog at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(base_url, CATALOG_TIMEOUT)?,
        })
    }

    /// Catalog base URL
    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    /// Full quote for `stock`
    pub async fn lookup(&self, stock: &str) -> Result<StockQuote> {
        let (status, quote) = self
            .rest
            .get_raw::<StockQuote>(&stock_path(stock)?)
            .await
            .map_err(unreachable)?;
        match quote {
            Some(quote) => Ok(quote),
            None => Err(status_error(status, stock)),
        }
    }
}

fn stock_path(stock: &str) -> Result<String> {
    check_stock_name(stock)?;
    Ok(format!("/stocks/{}", stock))
}

fn unreachable(e: Error) -> Error {
    tracing::error!("Catalog error: {}", e);
    Error::collaborator(e.to_string())
}

fn status_error(status: StatusCode, stock: &str) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::not_found(format!("no stock named {}", stock)),
        StatusCode::BAD_REQUEST => {
            Error::invalid_request(format!("catalog rejected the trade on {}", stock))
        }
        other => Error::collaborator(format!("catalog answered {} for {}", other, stock)),
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn quantity(&self, stock: &str) -> Result<u64> {
        Ok(self.lookup(stock).await?.quantity)
    }

    async fn apply_trade(&self, trade: &Trade) -> Result<()> {
        let body = CatalogTrade {
            trade_type: trade.trade_type,
            quantity: trade.quantity,
        };
        let status = self
            .rest
            .post_raw(&stock_path(&trade.stock_name)?, &body)
            .await
            .map_err(unreachable)?;
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, &trade.stock_name))
        }
    }
}
