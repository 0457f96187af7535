//! Deterministic leader election
//!
//! Candidates are probed in descending endpoint order and the first healthy
//! one wins, so every caller looking at the same membership converges on the
//! same leader without talking to each other. This is not consensus: two
//! callers on different sides of a partition can pick different leaders.

use super::config::Member;
use super::peer::{PeerClient, with_timeout};
use crate::{Error, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Picks and announces a leader among a fixed membership
pub struct LeaderElector {
    members: Vec<Member>,
    peers: Arc<dyn PeerClient>,
    probe_timeout: Duration,
    notify_timeout: Duration,
}

impl LeaderElector {
    /// Create an elector over `members`
    pub fn new(
        members: Vec<Member>,
        peers: Arc<dyn PeerClient>,
        probe_timeout: Duration,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            members,
            peers,
            probe_timeout,
            notify_timeout,
        }
    }

    /// Candidates in probe order
    pub fn candidates(&self) -> Vec<Member> {
        let mut candidates = self.members.clone();
        candidates.sort_by(|a, b| b.endpoint.cmp(&a.endpoint));
        candidates
    }

    /// Probe candidates in order, announce the first healthy one to everyone.
    /// Fails with [`Error::LeaderUnavailable`] when nobody answers.
    pub async fn elect(&self) -> Result<Member> {
        for candidate in self.candidates() {
            let probe = with_timeout(
                self.probe_timeout,
                &candidate.endpoint,
                self.peers.ping(&candidate.endpoint),
            )
            .await;
            match probe {
                Ok(health) if health.is_healthy() => {
                    tracing::info!("Elected {} as leader", candidate);
                    self.announce(&candidate).await;
                    return Ok(candidate);
                }
                Ok(health) => {
                    tracing::warn!("{} answered with status {}", candidate, health.status);
                }
                Err(e) => {
                    tracing::warn!("{} failed liveness probe: {}", candidate, e);
                }
            }
        }
        Err(Error::leader_unavailable(format!(
            "none of {} replicas answered the liveness probe",
            self.members.len()
        )))
    }

    /// Best-effort leader notification to every member, the leader included
    async fn announce(&self, leader: &Member) {
        let notifications = self.members.iter().map(|member| async move {
            let result = with_timeout(
                self.notify_timeout,
                &member.endpoint,
                self.peers.set_leader(&member.endpoint, leader.id),
            )
            .await;
            (member, result)
        });

        for (member, result) in join_all(notifications).await {
            match result {
                Ok(()) => tracing::debug!("Notified {} of leader {}", member, leader.id),
                Err(e) => tracing::warn!("Could not notify {} of leader {}: {}", member, leader.id, e),
            }
        }
    }
}
