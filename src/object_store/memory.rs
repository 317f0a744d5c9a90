use super::ObjectStore;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory object store for tests and single-machine experiments.
pub struct MemoryObjectStore {
    buckets: DashMap<String, DashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn make_bucket(&self, name: &str) {
        self.buckets.entry(name.to_string()).or_default();
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.buckets.iter().map(|b| b.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.buckets
            .get(bucket)
            .and_then(|b| b.get(key).map(|o| o.clone()))
            .ok_or_else(|| anyhow!("no such object: {bucket}/{key}"))
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data);
        Ok(())
    }
}
