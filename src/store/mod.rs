//! DHT Key-Value Store Module
//!
//! In-memory store for the slice of the keyspace this node owns.
//!
//! ## Core Concepts
//! - **Ownership**: A node owns exactly the keys in the arc
//!   `(predecessor, self]`; writes for other keys are refused so the caller
//!   can re-route.
//! - **Versions**: Each key carries a counter assigned by its owner. Handoff
//!   is idempotent because a receiver only applies records that are newer
//!   than what it already holds.
//! - **Handoff**: When a new predecessor arrives, the records it now owns are
//!   pushed to it and deleted locally once the push is acknowledged.

pub mod memory;
pub mod types;

pub use memory::KvStore;
pub use types::Record;

use crate::ring::{Identifier, PeerHandle, in_arc};

/// Ownership predicate: `key ∈ (predecessor, self]`. While the predecessor is
/// unknown (bootstrap, or just cleared by the failure detector) the node
/// answers for the whole ring rather than refusing writes.
pub fn owns_key(key: Identifier, predecessor: Option<&PeerHandle>, local: &PeerHandle) -> bool {
    match predecessor {
        Some(pred) if pred.id != local.id => in_arc(key, pred.id, local.id, true),
        _ => true,
    }
}

#[cfg(test)]
mod tests;
