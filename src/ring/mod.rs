//! Ring Identifier Space & Node State Module
//!
//! Implements the identifier space of the Chord overlay and the per-node ring
//! state: predecessor pointer, successor list and finger table.
//!
//! ## Core Mechanisms
//! - **Identifiers**: Keys and peer endpoints are hashed onto a 128-bit ring;
//!   all placement decisions reduce to the directed-arc predicate `in_arc`.
//! - **Finger Table**: Per-node shortcuts to peers at exponentially increasing
//!   distances, giving O(log N) lookups.
//! - **Successor List**: The r immediate clockwise peers, kept for failure
//!   resilience; the head is the primary successor.

pub mod id;
pub mod peer;
pub mod state;

pub use id::{Identifier, RING_BITS, hash_id, in_arc};
pub use peer::PeerHandle;
pub use state::RingState;

#[cfg(test)]
mod tests;
