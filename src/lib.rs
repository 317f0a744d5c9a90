//! Distributed Job Execution over a Chord DHT
//!
//! This library crate defines the core modules of the node. It serves as the
//! foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems:
//!
//! - **`ring`**: The identifier space and per-node ring state (predecessor,
//!   successor list, finger table) with the arc predicate every placement
//!   decision reduces to.
//! - **`rpc`**: The peer transport. Length-prefixed TCP frames, correlation
//!   ids, per-call deadlines and the unreachable/timeout/remote failure
//!   taxonomy stabilization depends on.
//! - **`chord`**: The protocol engine: join, `find_successor`, stabilization,
//!   finger repair, predecessor checking and key handoff.
//! - **`store`**: The node's slice of the DHT, a versioned in-memory
//!   key-value store with ownership checks.
//! - **`jobs`**: The coordination layer on top: deterministic job placement,
//!   deduplication by job key, a bounded worker pool and routed completion.
//! - **`object_store`**: The thin contract over the external blob service
//!   that holds job inputs and outputs.
//! - **`http`**: The dashboard-facing axum surface.

pub mod chord;
pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod node;
pub mod object_store;
pub mod ring;
pub mod rpc;
pub mod store;
