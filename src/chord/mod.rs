//! Chord Protocol Engine Module
//!
//! Drives the ring: joining, lookups and the periodic maintenance that keeps
//! the overlay converged after membership changes.
//!
//! ## Core Mechanisms
//! - **Lookup**: `find_successor` resolves a key to its owning peer in
//!   O(log N) hops through the finger table, falling through to the
//!   next-closer finger when a hop is unreachable.
//! - **Stabilization**: Periodic successor verification and `notify`
//!   exchanges repair the ring after joins and failures; fingers are fixed
//!   round-robin by a separate timer, the predecessor by a third.
//! - **Handoff**: Adopting a new predecessor pushes it the records it now
//!   owns, version-gated on the receiving side.

pub mod service;

pub use service::ChordService;

#[cfg(test)]
mod tests;
