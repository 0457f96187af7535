//! Error types for Ordex Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using Ordex Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the replicated order ledger
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed order fields; never retried
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Buy larger than the quantity the catalog holds
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    /// Write sent to a replica that is not the leader
    #[error("Not leader: {0}")]
    NotLeader(String),

    /// Write sent to a leader whose recovery has not finished
    #[error("Leader initializing: {0}")]
    LeaderInitializing(String),

    /// No replica answered after bounded retries
    #[error("Leader unavailable: {0}")]
    LeaderUnavailable(String),

    /// Promise or accept quorum not reached
    #[error("Consensus failed: {0}")]
    ConsensusFailed(String),

    /// Catalog service unreachable or failing
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// Order or stock not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Replicate sent to a replica that believes it is the leader
    #[error("Replication conflict: {0}")]
    ReplicationConflict(String),

    /// Network-level failure or timeout talking to a peer
    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    /// Malformed record found in the order log
    #[error("Log corruption: {0}")]
    LogCorruption(String),

    /// I/O errors from the order log
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable, machine-readable error code carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InsufficientStock,
    NotLeader,
    LeaderInitializing,
    LeaderUnavailable,
    ConsensusFailed,
    CollaboratorUnavailable,
    NotFound,
    ReplicationConflict,
    PeerUnavailable,
    Internal,
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a not-leader error
    pub fn not_leader(msg: impl Into<String>) -> Self {
        Self::NotLeader(msg.into())
    }

    /// Create a leader-initializing error
    pub fn leader_initializing(msg: impl Into<String>) -> Self {
        Self::LeaderInitializing(msg.into())
    }

    /// Create a leader-unavailable error
    pub fn leader_unavailable(msg: impl Into<String>) -> Self {
        Self::LeaderUnavailable(msg.into())
    }

    /// Create a consensus error
    pub fn consensus(msg: impl Into<String>) -> Self {
        Self::ConsensusFailed(msg.into())
    }

    /// Create a collaborator error
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a peer error
    pub fn peer(msg: impl Into<String>) -> Self {
        Self::PeerUnavailable(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wire code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::InsufficientStock(_) => ErrorCode::InsufficientStock,
            Self::NotLeader(_) => ErrorCode::NotLeader,
            Self::LeaderInitializing(_) => ErrorCode::LeaderInitializing,
            Self::LeaderUnavailable(_) => ErrorCode::LeaderUnavailable,
            Self::ConsensusFailed(_) => ErrorCode::ConsensusFailed,
            Self::CollaboratorUnavailable(_) => ErrorCode::CollaboratorUnavailable,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::ReplicationConflict(_) => ErrorCode::ReplicationConflict,
            Self::PeerUnavailable(_) => ErrorCode::PeerUnavailable,
            Self::LogCorruption(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Config(_)
            | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Rebuild an error received from a remote replica
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            ErrorCode::InvalidRequest => Self::InvalidRequest(message),
            ErrorCode::InsufficientStock => Self::InsufficientStock(message),
            ErrorCode::NotLeader => Self::NotLeader(message),
            ErrorCode::LeaderInitializing => Self::LeaderInitializing(message),
            ErrorCode::LeaderUnavailable => Self::LeaderUnavailable(message),
            ErrorCode::ConsensusFailed => Self::ConsensusFailed(message),
            ErrorCode::CollaboratorUnavailable => Self::CollaboratorUnavailable(message),
            ErrorCode::NotFound => Self::NotFound(message),
            ErrorCode::ReplicationConflict => Self::ReplicationConflict(message),
            ErrorCode::PeerUnavailable => Self::PeerUnavailable(message),
            ErrorCode::Internal => Self::Internal(message),
        }
    }

    /// Whether the failure means "the peer could not be reached"
    pub fn is_peer_failure(&self) -> bool {
        matches!(self, Self::PeerUnavailable(_))
    }
}
