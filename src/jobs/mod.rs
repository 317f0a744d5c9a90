//! Job Coordination Module
//!
//! The DHT-backed job layer: deterministic placement of every job on the peer
//! owning its key, deduplication by job id, and execution on a bounded local
//! worker pool.
//!
//! ## Architecture Overview
//! 1. **Submission**: `JobCoordinator::submit` hashes the job's identity and
//!    routes it with `find_successor`; the owner coalesces duplicates and
//!    enqueues, everyone else forwards over RPC.
//! 2. **Execution**: Workers pull pending job ids from a bounded FIFO. A job
//!    is claimed by the `Pending -> Running(0)` transition, which fires at
//!    most once per key.
//! 3. **Completion**: The final state is written back through routed `put`,
//!    so a job whose owner changed mid-execution still lands on the current
//!    owner; the stale local copy is dropped.
//!
//! ## Submodules
//! - **`types`**: Job records, task kinds, states and the deterministic id.
//! - **`coordinator`**: Routing, deduplication and the local job table.
//! - **`executor`**: The worker pool and the panic-safe execution wrapper.
//! - **`processor`**: The external processing contract and its adapters.

pub mod coordinator;
pub mod executor;
pub mod processor;
pub mod types;

pub use coordinator::JobCoordinator;
pub use executor::JobExecutor;
pub use processor::{InstantProcessor, PipelineProcessor, ProgressFn, TaskProcessor};
pub use types::{JobRecord, JobRequest, JobState, JobStatusView, JobSummary, TaskKind};
