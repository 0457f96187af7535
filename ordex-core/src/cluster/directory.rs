//! Leader directory
//!
//! A replica's belief about who leads, what role it plays itself and whether
//! it may accept writes. Every leader-change notification bumps the
//! leadership epoch; a recovery started under an older epoch can no longer
//! mark the replica ready.

use crate::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of this replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// No leader notification received yet
    #[default]
    Unset,
    Follower,
    Leader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("unset"),
            Self::Follower => f.write_str("follower"),
            Self::Leader => f.write_str("leader"),
        }
    }
}

/// What a leader notification changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// This replica was promoted; recovery must run under `epoch`
    BecameLeader { epoch: u64 },
    /// This replica was already leader; nothing changes
    StillLeader,
    /// This replica led and now follows
    SteppedDown { epoch: u64 },
    /// This replica follows (again)
    Follower { epoch: u64 },
}

#[derive(Debug, Default)]
struct Belief {
    leader: Option<u16>,
    role: Role,
    epoch: u64,
    recovery_ready: bool,
}

/// Snapshot of the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryView {
    pub leader: Option<u16>,
    pub role: Role,
    pub epoch: u64,
    pub recovery_ready: bool,
}

/// Leader belief of one replica
pub struct LeaderDirectory {
    replica_id: u16,
    belief: RwLock<Belief>,
}

impl LeaderDirectory {
    /// Directory of a replica that has not heard from an elector yet
    pub fn new(replica_id: u16) -> Self {
        Self {
            replica_id,
            belief: RwLock::new(Belief::default()),
        }
    }

    /// Apply a leader notification
    pub fn observe(&self, leader_id: u16) -> Transition {
        let mut belief = self.belief.write();
        belief.leader = Some(leader_id);

        if leader_id == self.replica_id {
            if belief.role == Role::Leader {
                return Transition::StillLeader;
            }
            belief.role = Role::Leader;
            belief.epoch += 1;
            belief.recovery_ready = false;
            return Transition::BecameLeader {
                epoch: belief.epoch,
            };
        }

        let was_leader = belief.role == Role::Leader;
        belief.role = Role::Follower;
        belief.epoch += 1;
        belief.recovery_ready = false;
        if was_leader {
            Transition::SteppedDown {
                epoch: belief.epoch,
            }
        } else {
            Transition::Follower {
                epoch: belief.epoch,
            }
        }
    }

    /// Mark the replica ready if `epoch` is still the current leadership.
    /// Returns whether the flag was set.
    pub fn mark_ready(&self, epoch: u64) -> bool {
        let mut belief = self.belief.write();
        if belief.epoch != epoch || belief.role != Role::Leader {
            return false;
        }
        belief.recovery_ready = true;
        true
    }

    /// Admit a write, or say why not
    pub fn write_gate(&self) -> Result<()> {
        let belief = self.belief.read();
        match (belief.role, belief.recovery_ready) {
            (Role::Leader, true) => Ok(()),
            (Role::Leader, false) => Err(Error::leader_initializing(format!(
                "replica {} is still recovering",
                self.replica_id
            ))),
            _ => Err(Error::not_leader(match belief.leader {
                Some(leader) => format!("replica {} is not leader, replica {} is", self.replica_id, leader),
                None => format!("replica {} is not leader and knows no leader", self.replica_id),
            })),
        }
    }

    /// Whether this replica believes it leads
    pub fn is_leader(&self) -> bool {
        self.belief.read().role == Role::Leader
    }

    /// Current view
    pub fn view(&self) -> DirectoryView {
        let belief = self.belief.read();
        DirectoryView {
            leader: belief.leader,
            role: belief.role,
            epoch: belief.epoch,
            recovery_ready: belief.recovery_ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_requires_recovery() {
        let dir = LeaderDirectory::new(3);
        assert!(matches!(dir.write_gate(), Err(Error::NotLeader(_))));

        let Transition::BecameLeader { epoch } = dir.observe(3) else {
            panic!("expected promotion");
        };
        assert!(matches!(dir.write_gate(), Err(Error::LeaderInitializing(_))));
        assert!(dir.mark_ready(epoch));
        assert!(dir.write_gate().is_ok());
    }

    #[test]
    fn test_repeated_self_notification_is_noop() {
        let dir = LeaderDirectory::new(1);
        let Transition::BecameLeader { epoch } = dir.observe(1) else {
            panic!("expected promotion");
        };
        dir.mark_ready(epoch);
        assert_eq!(dir.observe(1), Transition::StillLeader);
        assert!(dir.view().recovery_ready);
        assert_eq!(dir.view().epoch, epoch);
    }

    #[test]
    fn test_stale_epoch_cannot_mark_ready() {
        let dir = LeaderDirectory::new(2);
        let Transition::BecameLeader { epoch } = dir.observe(2) else {
            panic!("expected promotion");
        };
        assert!(matches!(dir.observe(3), Transition::SteppedDown { .. }));
        assert!(!dir.mark_ready(epoch));

        let Transition::BecameLeader { epoch: newer } = dir.observe(2) else {
            panic!("expected promotion");
        };
        assert!(!dir.mark_ready(epoch));
        assert!(dir.mark_ready(newer));
    }

    #[test]
    fn test_follower_is_not_ready() {
        let dir = LeaderDirectory::new(1);
        assert!(matches!(dir.observe(2), Transition::Follower { .. }));
        let view = dir.view();
        assert_eq!(view.role, Role::Follower);
        assert_eq!(view.leader, Some(2));
        assert!(!view.recovery_ready);
        assert!(matches!(dir.write_gate(), Err(Error::NotLeader(_))));
    }
}
