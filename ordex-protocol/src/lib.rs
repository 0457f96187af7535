//! Ordex Protocol - wire formats and HTTP clients
//!
//! - [`wire`]: the `data`/`error` reply envelope and request bodies
//! - [`rest`]: envelope-aware REST client on `reqwest`
//! - [`peer`]: [`ordex_core::cluster::PeerClient`] over HTTP
//! - [`catalog`]: [`ordex_core::catalog::Catalog`] over HTTP

pub mod catalog;
pub mod peer;
pub mod rest;
pub mod wire;

pub use catalog::HttpCatalog;
pub use peer::HttpPeerClient;
pub use rest::RestClient;
pub use wire::{ErrorBody, Reply};
