use super::id::{Identifier, hash_id};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A peer of the ring: its identifier and the `host:port` endpoint of its RPC
/// listener. Handles are plain values; live connections are resolved through
/// the transport's pool, never held here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerHandle {
    pub id: Identifier,
    pub endpoint: String,
}

impl PeerHandle {
    /// Derives the peer's identifier from its endpoint, so every node maps an
    /// endpoint to the same ring position.
    pub fn from_endpoint(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let id = hash_id(endpoint.as_bytes());
        Self { id, endpoint }
    }
}

// Equality is by identifier: two handles for the same ring position are the
// same peer even if one carries a stale endpoint spelling.
impl PartialEq for PeerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerHandle {}

impl Hash for PeerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.endpoint, self.id)
    }
}
