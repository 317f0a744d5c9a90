use super::id::{Identifier, RING_BITS, in_arc};
use super::peer::PeerHandle;

/// Mutable ring state of the local node.
///
/// All mutators are pure in-memory updates; callers hold the enclosing lock
/// only for the duration of a single method, never across an RPC. Lookups take
/// a snapshot of the candidates they need and release the lock before the
/// first hop.
pub struct RingState {
    local: PeerHandle,
    max_successors: usize,
    pub predecessor: Option<PeerHandle>,
    /// Ordered clockwise neighbors; index 0 is the primary successor.
    pub successor_list: Vec<PeerHandle>,
    /// `finger_table[i]` is the successor of `local.id + 2^i`.
    pub finger_table: Vec<PeerHandle>,
    /// Cursor of the periodic finger repair.
    pub next_finger_to_fix: usize,
}

impl RingState {
    /// Bootstrap state for a brand-new ring: every pointer refers to the node
    /// itself until stabilization learns better.
    pub fn new(local: PeerHandle, max_successors: usize) -> Self {
        let max_successors = max_successors.max(1);
        Self {
            finger_table: vec![local.clone(); RING_BITS],
            successor_list: vec![local.clone(); max_successors],
            predecessor: None,
            next_finger_to_fix: 0,
            local,
            max_successors,
        }
    }

    pub fn local(&self) -> &PeerHandle {
        &self.local
    }

    pub fn successor(&self) -> &PeerHandle {
        &self.successor_list[0]
    }

    /// True while no pointer leads away from the local node.
    pub fn is_singleton(&self) -> bool {
        self.successor_list.iter().all(|p| p.id == self.local.id)
    }

    /// Installs (or clears) the predecessor. Pointing the predecessor at the
    /// node itself on a non-singleton ring is a protocol bug upstream, so it
    /// is treated as a clear.
    pub fn set_predecessor(&mut self, peer: Option<PeerHandle>) {
        self.predecessor = match peer {
            Some(p) if p.id == self.local.id && !self.is_singleton() => None,
            other => other,
        };
    }

    /// Rebuilds the successor list from a new primary plus the list fetched
    /// from it: own id elided, duplicates dropped, truncated to r.
    pub fn update_successor_list(&mut self, primary: PeerHandle, fetched: Vec<PeerHandle>) {
        let mut list: Vec<PeerHandle> = Vec::with_capacity(self.max_successors);
        list.push(primary);
        for peer in fetched {
            if list.len() == self.max_successors {
                break;
            }
            if peer.id == self.local.id || list.iter().any(|p| p.id == peer.id) {
                continue;
            }
            list.push(peer);
        }
        self.finger_table[0] = list[0].clone();
        self.successor_list = list;
    }

    /// Installs a new primary successor ahead of the current list, as when
    /// stabilization learns of a closer peer.
    pub fn adopt_successor(&mut self, peer: PeerHandle) {
        let mut fetched = std::mem::take(&mut self.successor_list);
        fetched.retain(|p| p.id != peer.id);
        self.update_successor_list(peer, fetched);
    }

    /// Drops the (dead) head of the successor list and promotes the next
    /// entry. Returns `None` when the list is exhausted, in which case the
    /// node has lost the ring and falls back to itself.
    pub fn evict_successor_head(&mut self) -> Option<PeerHandle> {
        if !self.successor_list.is_empty() {
            self.successor_list.remove(0);
        }
        match self.successor_list.first() {
            Some(next) => {
                let next = next.clone();
                self.finger_table[0] = next.clone();
                Some(next)
            }
            None => {
                self.successor_list.push(self.local.clone());
                self.finger_table[0] = self.local.clone();
                None
            }
        }
    }

    /// Fingers are best-effort: the new value replaces the old without any
    /// tighter-than check.
    pub fn set_finger(&mut self, i: usize, peer: PeerHandle) {
        self.finger_table[i] = peer;
    }

    /// Advances the repair cursor and returns the index to fix this round.
    pub fn advance_finger_cursor(&mut self) -> usize {
        let i = self.next_finger_to_fix;
        self.next_finger_to_fix = (i + 1) % RING_BITS;
        i
    }

    /// First peer, scanning fingers then successors from the farthest down,
    /// whose id lies in the open arc `(local, id)`; the local node if none.
    pub fn closest_preceding_peer(&self, id: Identifier) -> PeerHandle {
        self.lookup_candidates(id)
            .into_iter()
            .next()
            .unwrap_or_else(|| self.local.clone())
    }

    /// All known peers strictly preceding `id`, farthest first and deduped.
    /// Lookup failover walks this list so an unreachable finger falls through
    /// to the next-closer one.
    pub fn lookup_candidates(&self, id: Identifier) -> Vec<PeerHandle> {
        let mut candidates: Vec<PeerHandle> = Vec::new();
        let fingers = self.finger_table.iter().rev();
        let successors = self.successor_list.iter().rev();
        for peer in fingers.chain(successors) {
            if peer.id == self.local.id || !in_arc(peer.id, self.local.id, id, false) {
                continue;
            }
            if candidates.iter().any(|p| p.id == peer.id) {
                continue;
            }
            candidates.push(peer.clone());
        }
        candidates
    }

    /// Distinct live-ish peers this node knows about (fingers, successors,
    /// predecessor), used for ring-wide fan-outs.
    pub fn known_peers(&self) -> Vec<PeerHandle> {
        let mut peers: Vec<PeerHandle> = Vec::new();
        let all = self
            .finger_table
            .iter()
            .chain(self.successor_list.iter())
            .chain(self.predecessor.iter());
        for peer in all {
            if peer.id == self.local.id || peers.iter().any(|p| p.id == peer.id) {
                continue;
            }
            peers.push(peer.clone());
        }
        peers
    }

    /// Forgets every remote pointer, as when the successor list is exhausted
    /// and the node declares itself detached.
    pub fn reset_to_singleton(&mut self) {
        self.predecessor = None;
        self.successor_list = vec![self.local.clone(); self.max_successors];
        self.finger_table = vec![self.local.clone(); RING_BITS];
    }
}
