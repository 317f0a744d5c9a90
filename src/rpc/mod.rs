//! Peer RPC Transport Module
//!
//! Framed request/reply messaging between peers over plain TCP.
//!
//! ## Core Mechanisms
//! - **Framing**: 4-byte big-endian length prefix, then
//!   `correlation_id | kind | body` with bincode bodies.
//! - **Correlation**: The client multiplexes calls over one connection per
//!   peer and resolves replies through a correlation table, so a single
//!   socket serves many concurrent tasks.
//! - **Failure Classification**: Connect/read/write failures surface as
//!   `Unreachable` and expired deadlines as `Timeout`; both count against a
//!   peer's liveness. Structured error frames become `Remote` errors and do
//!   not. The transport never retries on its own.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::RpcClient;
pub use protocol::{Reply, Request};
pub use server::RpcServer;

#[cfg(test)]
mod tests;
