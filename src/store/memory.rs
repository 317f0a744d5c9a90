use super::types::Record;
use crate::error::StoreError;
use crate::ring::{Identifier, in_arc};

use dashmap::DashMap;

struct StoredValue {
    value: Vec<u8>,
    version: u64,
}

/// The node's slice of the DHT: a concurrent map of owned records.
///
/// The store is deliberately unaware of the ring topology; ownership checks
/// and routing live in the chord layer. Everything here is a pure in-memory
/// operation safe to call from any task.
pub struct KvStore {
    records: DashMap<Identifier, StoredValue>,
}

impl KvStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Stores a value under `key`, assigning the next version for that key.
    /// Returns the assigned version.
    pub fn local_put(&self, key: Identifier, value: Vec<u8>) -> u64 {
        let mut entry = self.records.entry(key).or_insert(StoredValue {
            value: Vec::new(),
            version: 0,
        });
        entry.version += 1;
        entry.value = value;
        entry.version
    }

    pub fn local_get(&self, key: Identifier) -> Option<Record> {
        self.records.get(&key).map(|stored| Record {
            key,
            value: stored.value.clone(),
            version: stored.version,
        })
    }

    pub fn local_delete(&self, key: Identifier) -> bool {
        self.records.remove(&key).is_some()
    }

    /// Applies an incoming replica or handoff record. Only a strictly newer
    /// version replaces the stored one, which makes retried handoffs
    /// idempotent; an older one reports `VersionStale` carrying the version
    /// the store kept.
    pub fn accept_replica(&self, record: Record) -> Result<u64, StoreError> {
        let mut entry = self.records.entry(record.key).or_insert(StoredValue {
            value: Vec::new(),
            version: 0,
        });
        if record.version > entry.version {
            entry.version = record.version;
            entry.value = record.value;
            Ok(entry.version)
        } else {
            Err(StoreError::VersionStale {
                current: entry.version,
                offered: record.version,
            })
        }
    }

    /// All records whose key lies in the arc `(lo, hi]`; the transfer unit of
    /// join-time pulls and predecessor handoff.
    pub fn records_in_arc(&self, lo: Identifier, hi: Identifier) -> Vec<Record> {
        self.records
            .iter()
            .filter(|entry| in_arc(*entry.key(), lo, hi, true))
            .map(|entry| Record {
                key: *entry.key(),
                value: entry.value().value.clone(),
                version: entry.value().version,
            })
            .collect()
    }

    /// Snapshot of every stored record.
    pub fn all_records(&self) -> Vec<Record> {
        self.records
            .iter()
            .map(|entry| Record {
                key: *entry.key(),
                value: entry.value().value.clone(),
                version: entry.value().version,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}
