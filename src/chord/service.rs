use crate::config::Config;
use crate::error::{LookupError, RpcError};
use crate::ring::{Identifier, PeerHandle, RingState, in_arc};
use crate::rpc::{Reply, Request, RpcClient};
use crate::store::KvStore;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// The chord protocol engine for one node.
///
/// Ring state lives behind an `RwLock` whose write guard is only ever held
/// across pure in-memory updates; every RPC happens after the lock is
/// released, against a snapshot taken at the start of the hop. Staleness
/// within one hop is tolerated and repaired by the next stabilization round.
pub struct ChordService {
    local: PeerHandle,
    state: RwLock<RingState>,
    rpc: Arc<RpcClient>,
    store: Arc<KvStore>,
    bootstrap: Option<String>,
    bootstrap_fallback_singleton: bool,
    /// Set when the successor list is exhausted; lookups refuse to answer for
    /// the whole ring until the node is linked back in.
    detached: AtomicBool,
    t_stabilize: Duration,
    t_fix_fingers: Duration,
    t_check_predecessor: Duration,
}

impl ChordService {
    pub fn new(
        local: PeerHandle,
        config: &Config,
        rpc: Arc<RpcClient>,
        store: Arc<KvStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(RingState::new(local.clone(), config.successor_list_r as usize)),
            local,
            rpc,
            store,
            bootstrap: config.bootstrap_node.clone(),
            bootstrap_fallback_singleton: config.bootstrap_fallback_singleton,
            detached: AtomicBool::new(false),
            t_stabilize: Duration::from_millis(config.t_stabilize_ms),
            t_fix_fingers: Duration::from_millis(config.t_fix_fingers_ms),
            t_check_predecessor: Duration::from_millis(config.t_check_predecessor_ms),
        })
    }

    pub fn local(&self) -> &PeerHandle {
        &self.local
    }

    /// Delegated lookups fan out downstream hops before answering, so they
    /// get more room than single-hop probes.
    fn lookup_deadline(&self) -> Duration {
        self.rpc.default_deadline() * 4
    }

    // ============================================================
    // Read accessors
    // ============================================================

    pub async fn predecessor(&self) -> Option<PeerHandle> {
        self.state.read().await.predecessor.clone()
    }

    pub async fn successor_list(&self) -> Vec<PeerHandle> {
        self.state.read().await.successor_list.clone()
    }

    pub async fn finger_ids(&self) -> Vec<Identifier> {
        self.state
            .read()
            .await
            .finger_table
            .iter()
            .map(|p| p.id)
            .collect()
    }

    pub async fn known_peers(&self) -> Vec<PeerHandle> {
        self.state.read().await.known_peers()
    }

    /// A node counts as online once it either knows its predecessor or has a
    /// successor other than itself; a freshly formed singleton is "offline"
    /// until someone joins it.
    pub async fn is_online(&self) -> bool {
        let state = self.state.read().await;
        state.predecessor.is_some() || state.successor().id != self.local.id
    }

    // ============================================================
    // Join
    // ============================================================

    /// Enters the ring. Without a bootstrap peer the singleton state built at
    /// startup already is the ring. With one, the successor is resolved
    /// through the bootstrap peer and the records this node now owns are
    /// pulled over; an unreachable bootstrap peer is retried with backoff
    /// unless the configuration opts into a singleton fallback.
    pub async fn join(&self) -> anyhow::Result<()> {
        let Some(bootstrap) = self.bootstrap.clone() else {
            tracing::info!("no bootstrap node, forming new ring as {}", self.local);
            return Ok(());
        };

        let bootstrap_peer = PeerHandle::from_endpoint(bootstrap);
        if bootstrap_peer.id == self.local.id {
            tracing::info!("bootstrap node is myself, forming new ring");
            return Ok(());
        }

        let mut attempt: u32 = 0;
        loop {
            match self.join_via(&bootstrap_peer).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if self.bootstrap_fallback_singleton {
                        tracing::warn!(
                            "bootstrap via {} failed ({}), forming singleton ring",
                            bootstrap_peer.endpoint,
                            e
                        );
                        return Ok(());
                    }
                    let delay = Duration::from_millis(500).saturating_mul(attempt.min(10));
                    tracing::warn!(
                        "bootstrap via {} failed ({}), retry {} in {:?}",
                        bootstrap_peer.endpoint,
                        e,
                        attempt,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn join_via(&self, bootstrap_peer: &PeerHandle) -> Result<(), RpcError> {
        let reply = self
            .rpc
            .call(
                bootstrap_peer,
                Request::FindSuccessor { id: self.local.id },
                self.lookup_deadline(),
            )
            .await?;
        let successor = match reply {
            Reply::Successor(peer) => peer,
            other => {
                return Err(RpcError::FrameCorrupt(format!(
                    "unexpected reply to find_successor: {other:?}"
                )));
            }
        };

        // best-effort: the list fills in during stabilization anyway
        let fetched = match self
            .rpc
            .call_default(&successor, Request::GetSuccessorList)
            .await
        {
            Ok(Reply::SuccessorList(list)) => list,
            _ => Vec::new(),
        };

        {
            let mut state = self.state.write().await;
            state.set_predecessor(None);
            state.update_successor_list(successor.clone(), fetched);
        }
        self.detached.store(false, Ordering::Relaxed);
        tracing::info!("joined ring via {}, successor {}", bootstrap_peer, successor);

        self.pull_owned_records(&successor).await;
        Ok(())
    }

    /// Pulls the records the new node is responsible for from its successor:
    /// everything in `(successor, self]`, which is exactly the keyspace that
    /// stops being the successor's once this node is in place.
    async fn pull_owned_records(&self, successor: &PeerHandle) {
        if successor.id == self.local.id {
            return;
        }
        match self
            .rpc
            .call_default(
                successor,
                Request::TransferRange {
                    lo: successor.id,
                    hi: self.local.id,
                },
            )
            .await
        {
            Ok(Reply::Records(records)) => {
                let mut pulled = 0usize;
                for record in records {
                    if self.store.accept_replica(record).is_ok() {
                        pulled += 1;
                    }
                }
                if pulled > 0 {
                    tracing::info!("pulled {} records from {}", pulled, successor.endpoint);
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("record pull from {} failed: {}", successor.endpoint, e);
            }
        }
    }

    // ============================================================
    // Lookup
    // ============================================================

    /// Resolves the peer responsible for `id`.
    ///
    /// If the key falls between this node and its successor the successor
    /// answers directly; otherwise the lookup is delegated to the closest
    /// preceding known peer, trying the next-closer candidate whenever a hop
    /// fails its liveness probe.
    pub async fn find_successor(&self, id: Identifier) -> Result<PeerHandle, LookupError> {
        if self.detached.load(Ordering::Relaxed) {
            return Err(LookupError::Detached);
        }

        let (successor, candidates) = {
            let state = self.state.read().await;
            (state.successor().clone(), state.lookup_candidates(id))
        };

        if in_arc(id, self.local.id, successor.id, true) {
            return Ok(successor);
        }

        for peer in candidates {
            match self
                .rpc
                .call(&peer, Request::FindSuccessor { id }, self.lookup_deadline())
                .await
            {
                Ok(Reply::Successor(found)) => return Ok(found),
                Ok(other) => {
                    tracing::debug!("unexpected lookup reply from {}: {:?}", peer.endpoint, other);
                }
                Err(e) if e.is_peer_failure() => {
                    tracing::debug!("lookup hop {} failed: {}", peer.endpoint, e);
                }
                Err(e) => {
                    tracing::debug!("lookup via {} rejected: {}", peer.endpoint, e);
                }
            }
        }

        Err(LookupError::Exhausted)
    }

    // ============================================================
    // Notify & handoff
    // ============================================================

    /// A peer believes it is our predecessor. Adopt it if we have none or it
    /// sits closer than the current one, then hand it the records it now
    /// owns.
    pub async fn handle_notify(&self, peer: PeerHandle) {
        if peer.id == self.local.id {
            return;
        }

        let adopted = {
            let mut state = self.state.write().await;
            let adopt = match &state.predecessor {
                None => true,
                Some(current) => in_arc(peer.id, current.id, self.local.id, false),
            };
            if adopt {
                let old = state.predecessor.clone();
                state.set_predecessor(Some(peer.clone()));
                Some(old)
            } else {
                None
            }
        };

        if let Some(old_predecessor) = adopted {
            tracing::info!("adopted predecessor {}", peer);
            // the arc the new predecessor owns starts after the old one, or
            // after ourselves when we previously answered for the whole ring
            let lo = old_predecessor.map(|p| p.id).unwrap_or(self.local.id);
            let records = self.store.records_in_arc(lo, peer.id);
            if !records.is_empty() {
                let rpc = self.rpc.clone();
                let store = self.store.clone();
                tokio::spawn(async move {
                    Self::hand_off(rpc, store, peer, records).await;
                });
            }
        }
    }

    /// Pushes records to their new owner, deleting each local copy only after
    /// the push is acknowledged. Failures leave the copy in place; the next
    /// predecessor change or an explicit pull will retry.
    async fn hand_off(
        rpc: Arc<RpcClient>,
        store: Arc<KvStore>,
        target: PeerHandle,
        records: Vec<crate::store::Record>,
    ) {
        let total = records.len();
        let mut moved = 0usize;
        for record in records {
            let key = record.key;
            match rpc.call_default(&target, Request::Put { record }).await {
                Ok(Reply::PutAck { .. }) => {
                    store.local_delete(key);
                    moved += 1;
                }
                Ok(other) => {
                    tracing::debug!("handoff of {} got unexpected reply: {:?}", key, other);
                }
                Err(e) => {
                    tracing::debug!("handoff of {} to {} deferred: {}", key, target.endpoint, e);
                }
            }
        }
        tracing::info!("handed off {}/{} records to {}", moved, total, target.endpoint);
    }

    // ============================================================
    // Maintenance loops
    // ============================================================

    pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        tracing::info!("starting ring maintenance for {}", self.local);

        let service = self.clone();
        let mut stabilize_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.t_stabilize);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => service.stabilize().await,
                    _ = stabilize_shutdown.changed() => break,
                }
            }
        });

        let service = self.clone();
        let mut fingers_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.t_fix_fingers);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => service.fix_next_finger().await,
                    _ = fingers_shutdown.changed() => break,
                }
            }
        });

        let service = self.clone();
        let mut predecessor_shutdown = shutdown;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.t_check_predecessor);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => service.check_predecessor().await,
                    _ = predecessor_shutdown.changed() => break,
                }
            }
        });
    }

    /// One stabilization round: verify the primary successor against its own
    /// predecessor pointer, notify it of our existence and refresh the
    /// successor list from it.
    pub async fn stabilize(&self) {
        let successor = {
            let state = self.state.read().await;
            state.successor().clone()
        };

        if successor.id == self.local.id {
            self.stabilize_singleton().await;
            return;
        }

        match self
            .rpc
            .call_default(&successor, Request::GetPredecessor)
            .await
        {
            Ok(Reply::Predecessor(Some(candidate)))
                if candidate.id != self.local.id
                    && in_arc(candidate.id, self.local.id, successor.id, false) =>
            {
                // adopt only a live candidate; a stale pointer to a dead peer
                // must not wedge the ring
                if matches!(
                    self.rpc.call_default(&candidate, Request::Ping).await,
                    Ok(Reply::Pong)
                ) {
                    tracing::info!("adopting closer successor {}", candidate);
                    self.state.write().await.adopt_successor(candidate);
                }
            }
            Ok(_) => {}
            Err(e) if e.is_peer_failure() => {
                self.handle_successor_failure(&successor, &e).await;
                return;
            }
            Err(e) => {
                tracing::debug!("get_predecessor from {} failed: {}", successor.endpoint, e);
            }
        }

        let primary = {
            let state = self.state.read().await;
            state.successor().clone()
        };
        if primary.id == self.local.id {
            return;
        }

        match self
            .rpc
            .call_default(
                &primary,
                Request::Notify {
                    peer: self.local.clone(),
                },
            )
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_peer_failure() => {
                self.handle_successor_failure(&primary, &e).await;
                return;
            }
            Err(e) => {
                tracing::debug!("notify to {} failed: {}", primary.endpoint, e);
            }
        }

        // processed strictly after the notify so the successor's view already
        // includes us when we roll its list forward
        if let Ok(Reply::SuccessorList(fetched)) = self
            .rpc
            .call_default(&primary, Request::GetSuccessorList)
            .await
        {
            let mut state = self.state.write().await;
            state.update_successor_list(primary, fetched);
        }
    }

    /// A singleton that somebody notified adopts that peer as its successor,
    /// closing a two-node ring. A singleton that was configured with a
    /// bootstrap peer keeps trying to rejoin it (it may have been detached by
    /// a transient failure).
    async fn stabilize_singleton(&self) {
        let predecessor = {
            let state = self.state.read().await;
            state.predecessor.clone()
        };

        if let Some(peer) = predecessor.filter(|p| p.id != self.local.id) {
            {
                let mut state = self.state.write().await;
                state.update_successor_list(peer.clone(), Vec::new());
            }
            self.detached.store(false, Ordering::Relaxed);
            tracing::info!("singleton linked back to {}", peer);
            let _ = self
                .rpc
                .call_default(
                    &peer,
                    Request::Notify {
                        peer: self.local.clone(),
                    },
                )
                .await;
            return;
        }

        if let Some(bootstrap) = &self.bootstrap {
            let bootstrap_peer = PeerHandle::from_endpoint(bootstrap.clone());
            if bootstrap_peer.id != self.local.id {
                if let Err(e) = self.join_via(&bootstrap_peer).await {
                    tracing::debug!("rejoin via {} failed: {}", bootstrap_peer.endpoint, e);
                }
            }
        }
    }

    /// Evicts a dead primary successor. When the list runs dry the node is
    /// detached: it resets to a singleton and stabilization falls back to
    /// re-bootstrapping.
    async fn handle_successor_failure(&self, dead: &PeerHandle, cause: &RpcError) {
        tracing::warn!("successor {} unreachable: {}", dead.endpoint, cause);
        let promoted = {
            let mut state = self.state.write().await;
            if state.successor().id != dead.id {
                return; // someone already replaced it
            }
            state.evict_successor_head()
        };
        match promoted {
            Some(next) => tracing::info!("promoted successor {}", next),
            None => {
                self.state.write().await.reset_to_singleton();
                if self.bootstrap.is_some() {
                    // detached until a rejoin or an incoming notify links us
                    // back; lookups refuse rather than answer for everything
                    tracing::warn!("successor list exhausted, ring detached");
                    self.detached.store(true, Ordering::Relaxed);
                } else {
                    tracing::warn!("successor list exhausted, forming singleton ring");
                }
            }
        }
    }

    /// Repairs one finger per tick, wrapping around the table. Lookup errors
    /// leave the stale entry in place.
    pub async fn fix_next_finger(&self) {
        let (index, start) = {
            let mut state = self.state.write().await;
            let index = state.advance_finger_cursor();
            (index, self.local.id.finger_start(index))
        };

        match self.find_successor(start).await {
            Ok(peer) => {
                self.state.write().await.set_finger(index, peer);
            }
            Err(e) => {
                tracing::debug!("fix_fingers[{}] failed: {}", index, e);
            }
        }
    }

    /// Probes the predecessor; a failed liveness probe clears it so the next
    /// notify can install a live one.
    pub async fn check_predecessor(&self) {
        let predecessor = {
            let state = self.state.read().await;
            state.predecessor.clone()
        };
        let Some(peer) = predecessor.filter(|p| p.id != self.local.id) else {
            return;
        };

        match self.rpc.call_default(&peer, Request::Ping).await {
            Ok(_) => {}
            Err(e) if e.is_peer_failure() => {
                tracing::warn!("predecessor {} unreachable: {}", peer.endpoint, e);
                self.state.write().await.set_predecessor(None);
            }
            Err(e) => {
                tracing::debug!("predecessor probe to {} rejected: {}", peer.endpoint, e);
            }
        }
    }
}
