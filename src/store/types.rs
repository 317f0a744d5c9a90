use crate::ring::Identifier;
use serde::{Deserialize, Serialize};

/// A stored key-value pair as it travels between peers.
///
/// `version` is assigned by the owning peer and increases monotonically per
/// key; the higher version wins wherever two copies meet. A version of zero on
/// an incoming `put` asks the receiver to assign a fresh one (a routed client
/// write), any other value is a replica or handoff carrying its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Identifier,
    pub value: Vec<u8>,
    pub version: u64,
}
