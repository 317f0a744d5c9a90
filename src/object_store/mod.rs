//! Object Store Adapter Module
//!
//! Thin contract over the external bucket-oriented blob service that holds
//! job inputs and outputs. The node core only ever talks to the trait;
//! `HttpObjectStore` adapts a MinIO-style endpoint, `MemoryObjectStore`
//! backs tests and local experiments.

pub mod http;
pub mod memory;

pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;

use anyhow::Result;
use async_trait::async_trait;

/// Handle of a produced artifact, as stored on the job record.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<String>>;
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;
}
