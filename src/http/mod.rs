//! HTTP Surface Module
//!
//! Axum routes consumed by the dashboard and external clients. The handlers
//! are a thin veneer: every decision is made by the coordinator or the chord
//! engine, the handlers only translate between JSON and the core types.

pub mod handlers;

pub use handlers::router;
