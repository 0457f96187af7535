//! Cluster coordination
//!
//! Leader election and routing, the leader directory, recovery, anti-entropy,
//! primary-backup push replication and the Paxos write path, tied together
//! by [`Replica`].
//!
//! # Example
//!
//! ```rust,no_run
//! use ordex_core::cluster::{ClusterConfig, Member, OrderingVariant, Replica};
//! # use std::sync::Arc;
//! # fn demo(
//! #     store: ordex_core::store::OrderStore,
//! #     catalog: Arc<dyn ordex_core::catalog::Catalog>,
//! #     peers: Arc<dyn ordex_core::cluster::PeerClient>,
//! # ) -> ordex_core::Result<()> {
//! let members = vec![
//!     Member::new(1, "http://order-service-1:8998"),
//!     Member::new(2, "http://order-service-2:8999"),
//!     Member::new(3, "http://order-service-3:9000"),
//! ];
//! let config = ClusterConfig::new(1, members).with_variant(OrderingVariant::Paxos);
//! let replica = Replica::new(config, store, catalog, peers)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod counter;
pub mod directory;
pub mod elector;
pub mod paxos;
pub mod peer;
pub mod recovery;
pub mod replica;
pub mod replication;
pub mod router;
pub mod sync;

pub use config::{ClusterConfig, Endpoint, Member, OrderingVariant};
pub use counter::TransactionCounter;
pub use directory::{DirectoryView, LeaderDirectory, Role, Transition};
pub use elector::LeaderElector;
pub use paxos::{Acceptor, ProposalIds, Proposer};
pub use peer::{AcceptReply, Health, PeerClient, Promise, ReplicateOutcome, with_timeout};
pub use recovery::{RecoveryManager, RecoveryReport};
pub use replica::Replica;
pub use replication::Replicator;
pub use router::LeaderRouter;
pub use sync::{AntiEntropy, SyncReport};
