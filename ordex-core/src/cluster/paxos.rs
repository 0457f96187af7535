//! Single-decree Paxos per order
//!
//! Every order write runs one prepare/accept instance over all replicas. The
//! proposer's own [`Acceptor`] takes part like any other replica, so its vote
//! is subject to the same promise rules. The transaction number is assigned
//! by the leader after the value is chosen and is not itself agreed on.

use super::config::Member;
use super::peer::{AcceptReply, PeerClient, Promise, with_timeout};
use crate::order::Trade;
use crate::{Error, Result};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of low bits holding the replica id in a proposal id
pub const REPLICA_ID_BITS: u32 = 16;

/// Globally unique, time-ordered proposal ids for one proposer:
/// `(unix_millis << 16) | replica_id`, strictly increasing even if the clock
/// stalls or steps back.
pub struct ProposalIds {
    replica_id: u16,
    last: Mutex<u64>,
}

impl ProposalIds {
    /// Generator for `replica_id`
    pub fn new(replica_id: u16) -> Self {
        Self {
            replica_id,
            last: Mutex::new(0),
        }
    }

    /// Next proposal id
    pub fn next(&self) -> u64 {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.next_at(millis)
    }

    fn next_at(&self, millis: u64) -> u64 {
        let mut last = self.last.lock();
        let mut stamp = millis;
        if (stamp << REPLICA_ID_BITS) | u64::from(self.replica_id) <= *last {
            stamp = (*last >> REPLICA_ID_BITS) + 1;
        }
        let id = (stamp << REPLICA_ID_BITS) | u64::from(self.replica_id);
        *last = id;
        id
    }

    /// Replica id encoded in `proposal_id`
    pub fn proposer_of(proposal_id: u64) -> u16 {
        (proposal_id & ((1 << REPLICA_ID_BITS) - 1)) as u16
    }
}

#[derive(Debug, Default)]
struct AcceptorState {
    promised: u64,
    accepted_id: Option<u64>,
    accepted_value: Option<Trade>,
}

/// Acceptor role of one replica. Promises only move forward.
#[derive(Default)]
pub struct Acceptor {
    state: Mutex<AcceptorState>,
}

impl Acceptor {
    /// Fresh acceptor that has promised nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: promise iff `proposal_id` is strictly above the current promise
    pub fn prepare(&self, proposal_id: u64) -> Promise {
        let mut state = self.state.lock();
        let promise = proposal_id > state.promised;
        if promise {
            state.promised = proposal_id;
        } else {
            tracing::debug!(
                "Refusing prepare {}, already promised {}",
                proposal_id,
                state.promised
            );
        }
        Promise {
            promise,
            promised_id: state.promised,
            accepted_id: state.accepted_id,
            accepted_value: state.accepted_value.clone(),
        }
    }

    /// Phase 2: accept iff `proposal_id` is at least the current promise
    pub fn accept(&self, proposal_id: u64, value: &Trade) -> AcceptReply {
        let mut state = self.state.lock();
        if proposal_id < state.promised {
            tracing::debug!(
                "Refusing accept {}, already promised {}",
                proposal_id,
                state.promised
            );
            return AcceptReply {
                accepted: false,
                promised_id: state.promised,
            };
        }
        state.promised = proposal_id;
        state.accepted_id = Some(proposal_id);
        state.accepted_value = Some(value.clone());
        AcceptReply {
            accepted: true,
            promised_id: proposal_id,
        }
    }

    /// Highest promise made so far
    pub fn promised(&self) -> u64 {
        self.state.lock().promised
    }

    /// Last accepted proposal and value
    pub fn accepted(&self) -> Option<(u64, Trade)> {
        let state = self.state.lock();
        state.accepted_id.zip(state.accepted_value.clone())
    }
}

/// Vote counts of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub granted: usize,
    pub refused: usize,
    pub unreachable: usize,
}

/// Proposer side of a round
pub struct Proposer {
    ids: ProposalIds,
    peers: Arc<dyn PeerClient>,
    others: Vec<Member>,
    quorum: usize,
    timeout: Duration,
}

impl Proposer {
    /// Create a proposer; `quorum` counts the proposer itself
    pub fn new(
        replica_id: u16,
        peers: Arc<dyn PeerClient>,
        others: Vec<Member>,
        quorum: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            ids: ProposalIds::new(replica_id),
            peers,
            others,
            quorum,
            timeout,
        }
    }

    /// Quorum size
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Get `value` chosen by a majority. Returns the proposal id that won.
    pub async fn propose(&self, local: &Acceptor, value: &Trade) -> Result<u64> {
        let proposal_id = self.ids.next();

        let promises = self.prepare_phase(local, proposal_id).await;
        if promises.granted < self.quorum {
            tracing::warn!(
                "Proposal {} failed promises: {}/{} needed, {} refused, {} unreachable",
                proposal_id,
                promises.granted,
                self.quorum,
                promises.refused,
                promises.unreachable
            );
            return Err(Error::consensus(format!(
                "failed promises: {} of {} needed",
                promises.granted, self.quorum
            )));
        }

        let accepts = self.accept_phase(local, proposal_id, value).await;
        if accepts.granted < self.quorum {
            tracing::warn!(
                "Proposal {} failed accepts: {}/{} needed, {} refused, {} unreachable",
                proposal_id,
                accepts.granted,
                self.quorum,
                accepts.refused,
                accepts.unreachable
            );
            return Err(Error::consensus(format!(
                "failed accepts: {} of {} needed",
                accepts.granted, self.quorum
            )));
        }

        tracing::info!(
            "Proposal {} chosen for {} {} x{} ({} promises, {} accepts)",
            proposal_id,
            value.trade_type,
            value.stock_name,
            value.quantity,
            promises.granted,
            accepts.granted
        );
        Ok(proposal_id)
    }

    async fn prepare_phase(&self, local: &Acceptor, proposal_id: u64) -> Tally {
        let mut tally = Tally::default();
        let local_promise = local.prepare(proposal_id);
        self.count_promise(&mut tally, proposal_id, "self", &local_promise);

        let requests = self.others.iter().map(|member| async move {
            let result = with_timeout(
                self.timeout,
                &member.endpoint,
                self.peers.prepare(&member.endpoint, proposal_id),
            )
            .await;
            (member, result)
        });
        for (member, result) in join_all(requests).await {
            match result {
                Ok(promise) => {
                    self.count_promise(&mut tally, proposal_id, &member.to_string(), &promise)
                }
                Err(e) => {
                    tracing::warn!("Prepare {} to {} failed: {}", proposal_id, member, e);
                    tally.unreachable += 1;
                }
            }
        }
        tally
    }

    fn count_promise(&self, tally: &mut Tally, proposal_id: u64, from: &str, promise: &Promise) {
        if let (Some(accepted_id), Some(value)) = (promise.accepted_id, &promise.accepted_value) {
            tracing::debug!(
                "{} previously accepted {} under proposal {}, not adopted",
                from,
                value.stock_name,
                accepted_id
            );
        }
        if promise.promise {
            tally.granted += 1;
        } else {
            tracing::warn!(
                "{} refused prepare {}, promised {}",
                from,
                proposal_id,
                promise.promised_id
            );
            tally.refused += 1;
        }
    }

    async fn accept_phase(&self, local: &Acceptor, proposal_id: u64, value: &Trade) -> Tally {
        let mut tally = Tally::default();
        if local.accept(proposal_id, value).accepted {
            tally.granted += 1;
        } else {
            tally.refused += 1;
        }

        let requests = self.others.iter().map(|member| async move {
            let result = with_timeout(
                self.timeout,
                &member.endpoint,
                self.peers.accept(&member.endpoint, proposal_id, value),
            )
            .await;
            (member, result)
        });
        for (member, result) in join_all(requests).await {
            match result {
                Ok(reply) if reply.accepted => tally.granted += 1,
                Ok(reply) => {
                    tracing::warn!(
                        "{} refused accept {}, promised {}",
                        member,
                        proposal_id,
                        reply.promised_id
                    );
                    tally.refused += 1;
                }
                Err(e) => {
                    tracing::warn!("Accept {} to {} failed: {}", proposal_id, member, e);
                    tally.unreachable += 1;
                }
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade() -> Trade {
        Trade::buy("NVDA", 2).unwrap()
    }

    #[test]
    fn test_ids_embed_replica_and_increase() {
        let ids = ProposalIds::new(3);
        let a = ids.next_at(1_000);
        let b = ids.next_at(1_000);
        let c = ids.next_at(900);
        assert!(a < b && b < c);
        assert_eq!(ProposalIds::proposer_of(a), 3);
        assert_eq!(ProposalIds::proposer_of(c), 3);
        assert_eq!(a >> REPLICA_ID_BITS, 1_000);
    }

    #[test]
    fn test_ids_from_different_replicas_differ() {
        let a = ProposalIds::new(1).next_at(5_000);
        let b = ProposalIds::new(2).next_at(5_000);
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_prepare_requires_strictly_higher() {
        let acceptor = Acceptor::new();
        assert!(acceptor.prepare(10).promise);
        let again = acceptor.prepare(10);
        assert!(!again.promise);
        assert_eq!(again.promised_id, 10);
        assert!(!acceptor.prepare(5).promise);
        assert!(acceptor.prepare(11).promise);
    }

    #[test]
    fn test_accept_allows_equal_and_records_value() {
        let acceptor = Acceptor::new();
        acceptor.prepare(10);
        assert!(!acceptor.accept(9, &trade()).accepted);
        assert!(acceptor.accept(10, &trade()).accepted);
        assert_eq!(acceptor.accepted(), Some((10, trade())));

        let promise = acceptor.prepare(20);
        assert_eq!(promise.accepted_id, Some(10));
        assert_eq!(promise.accepted_value, Some(trade()));
    }

    #[test]
    fn test_accept_raises_promise() {
        let acceptor = Acceptor::new();
        assert!(acceptor.accept(30, &trade()).accepted);
        assert_eq!(acceptor.promised(), 30);
        assert!(!acceptor.prepare(30).promise);
    }
}
