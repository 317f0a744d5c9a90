//! Error taxonomy shared across the node.
//!
//! Transport errors (`RpcError`) are recovered inside the chord engine where
//! possible: a failed hop falls through to the next-closer finger, a dead
//! successor is evicted from the successor list. Protocol errors
//! (`LookupError`) surface to the caller once recovery is exhausted. Storage
//! and job errors are routine outcomes rather than faults and are recorded on
//! the affected record instead of crashing the process.

use crate::ring::PeerHandle;
use thiserror::Error;

/// Failures raised by the peer RPC transport.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The peer could not be reached at all: connect, read or write on its
    /// connection failed. Only this variant (and `Timeout`, for probes)
    /// implies "peer dead" to stabilization.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// The reply did not arrive before the caller's deadline.
    #[error("rpc timed out after {0} ms")]
    Timeout(u64),

    /// The bytes on the wire did not decode into a valid frame or reply.
    #[error("corrupt frame: {0}")]
    FrameCorrupt(String),

    /// The peer answered with an error frame. The peer is alive; the request
    /// itself was rejected.
    #[error("remote error {code}: {message}")]
    Remote { code: u16, message: String },
}

impl RpcError {
    /// Whether this failure counts against the peer's liveness. RPCs double
    /// as failure probes, so an expired deadline is treated like a dead peer
    /// while a structured remote error is not.
    pub fn is_peer_failure(&self) -> bool {
        matches!(self, RpcError::Unreachable(_) | RpcError::Timeout(_))
    }
}

/// Failures of ring lookups, after transport-level recovery has run out.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup exhausted all candidate peers")]
    Exhausted,

    #[error("node is detached from the ring")]
    Detached,
}

/// Outcomes of local store operations that the caller must react to.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is outside this node's arc; the caller should re-route to the
    /// named peer.
    #[error("key not owned here, expected owner {}", expected.endpoint)]
    NotOwner { expected: PeerHandle },

    /// An incoming replica carried an older version than the stored record.
    /// Routine during retried handoffs; the caller acks with the version the
    /// receiver kept.
    #[error("stored version {current} is newer than offered {offered}")]
    VersionStale { current: u64, offered: u64 },
}

/// Failures in the job layer, stored on the job record where applicable.
#[derive(Debug, Error)]
pub enum JobError {
    /// The pending-job queue hit its high-water mark.
    #[error("job queue is full")]
    Overloaded,

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("executor failed: {0}")]
    ExecutorFailed(String),

    #[error("artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    #[error("routing failed: {0}")]
    Routing(#[from] LookupError),

    #[error("transport failed: {0}")]
    Transport(#[from] RpcError),
}
