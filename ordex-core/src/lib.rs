//! Ordex Core - Replicated Order Ledger
//!
//! A fixed set of replicas agree on, persist and serve a gap-free sequence
//! of buy/sell orders. Two ordering strategies share the same storage and
//! recovery machinery:
//! - Primary-backup: the leader sequences, pushes to followers, followers
//!   repair gaps by pulling (anti-entropy)
//! - Paxos: every order needs a prepare/accept quorum before the leader
//!   sequences it
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Replica                        │
//! │  (write gate, place/replicate/get handlers) │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │           Cluster Layer                      │
//! │ (Directory, Recovery, Anti-entropy, Paxos,  │
//! │  Push replication)                          │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │           Storage Layer                      │
//! │     (Order log, In-memory ledger)           │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]

pub mod catalog;
pub mod cluster;
pub mod error;
pub mod ledger;
pub mod log;
pub mod order;
pub mod retry;
pub mod store;
pub mod testing;

pub use error::{Error, ErrorCode, Result};
pub use order::{Order, OrderRecord, OrderRequest, Trade, TradeType};
