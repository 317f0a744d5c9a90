//! Chord Engine Tests
//!
//! Exercises the protocol paths that resolve without a live ring: singleton
//! lookups, notify adoption rules and the successor-failure fallbacks. The
//! multi-node convergence scenarios live in `tests/cluster.rs`.

#[cfg(test)]
mod tests {
    use crate::chord::ChordService;
    use crate::config::Config;
    use crate::ring::{Identifier, PeerHandle, hash_id};
    use crate::rpc::RpcClient;
    use crate::store::KvStore;

    use std::sync::Arc;
    use std::time::Duration;

    fn singleton_service(endpoint: &str) -> Arc<ChordService> {
        let config = Config::default();
        let rpc = RpcClient::new(Duration::from_millis(100));
        let store = Arc::new(KvStore::new());
        ChordService::new(PeerHandle::from_endpoint(endpoint), &config, rpc, store)
    }

    // ============================================================
    // SINGLETON LOOKUP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_singleton_owns_every_key() {
        let service = singleton_service("127.0.0.1:16501");
        let local_id = service.local().id;

        for seed in 0..50u32 {
            let key = hash_id(&seed.to_be_bytes());
            let owner = service.find_successor(key).await.unwrap();
            assert_eq!(owner.id, local_id);
        }
    }

    #[tokio::test]
    async fn test_singleton_fingers_point_to_self() {
        let service = singleton_service("127.0.0.1:16502");
        let local_id = service.local().id;

        let fingers = service.finger_ids().await;
        assert_eq!(fingers.len(), crate::ring::RING_BITS);
        assert!(fingers.iter().all(|id| *id == local_id));
    }

    #[tokio::test]
    async fn test_singleton_is_offline_until_joined() {
        let service = singleton_service("127.0.0.1:16503");
        assert!(!service.is_online().await);
    }

    // ============================================================
    // NOTIFY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_notify_installs_first_predecessor() {
        let service = singleton_service("127.0.0.1:16504");
        let peer = PeerHandle::from_endpoint("127.0.0.1:16599");

        service.handle_notify(peer.clone()).await;
        assert_eq!(service.predecessor().await, Some(peer));
        assert!(service.is_online().await);
    }

    #[tokio::test]
    async fn test_notify_ignores_self() {
        let service = singleton_service("127.0.0.1:16505");
        service.handle_notify(service.local().clone()).await;
        assert!(service.predecessor().await.is_none());
    }

    #[tokio::test]
    async fn test_notify_prefers_closer_predecessor() {
        let service = singleton_service("127.0.0.1:16506");
        let local_id = service.local().id;

        // craft two peers: `far` anywhere, `near` strictly between far and us
        let far = PeerHandle {
            id: Identifier(local_id.0.wrapping_add(10)),
            endpoint: "far:6501".to_string(),
        };
        let near = PeerHandle {
            id: Identifier(local_id.0.wrapping_sub(10)),
            endpoint: "near:6501".to_string(),
        };

        service.handle_notify(far.clone()).await;
        assert_eq!(service.predecessor().await, Some(far.clone()));

        // near lies in (far, local): adopt
        service.handle_notify(near.clone()).await;
        assert_eq!(service.predecessor().await, Some(near.clone()));

        // far does not lie in (near, local): keep near
        service.handle_notify(far).await;
        assert_eq!(service.predecessor().await, Some(near));
    }

    // ============================================================
    // STABILIZATION FALLBACK TESTS
    // ============================================================

    #[tokio::test]
    async fn test_stabilize_singleton_adopts_notifier_as_successor() {
        // a dead endpoint: adoption must not depend on reaching the peer
        let service = singleton_service("127.0.0.1:16507");
        let joiner = PeerHandle::from_endpoint("127.0.0.1:1");

        service.handle_notify(joiner.clone()).await;
        service.stabilize().await;

        let successors = service.successor_list().await;
        assert_eq!(successors[0], joiner, "notifier promoted to successor");
    }

    #[tokio::test]
    async fn test_check_predecessor_clears_dead_peer() {
        let service = singleton_service("127.0.0.1:16508");
        // port 1 on loopback refuses connections
        let dead = PeerHandle::from_endpoint("127.0.0.1:1");

        service.handle_notify(dead).await;
        assert!(service.predecessor().await.is_some());

        service.check_predecessor().await;
        assert!(service.predecessor().await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_falls_back_past_dead_fingers() {
        // successor is a dead peer; every delegation fails and the lookup
        // reports exhaustion instead of hanging or panicking
        let service = singleton_service("127.0.0.1:16509");
        let dead = PeerHandle::from_endpoint("127.0.0.1:1");
        service.handle_notify(dead).await;
        service.stabilize().await; // adopts the dead notifier as successor

        let local_id = service.local().id;
        // a key just past the dead successor is not in (local, dead], so the
        // lookup must delegate and exhaust
        let dead_id = service.successor_list().await[0].id;
        let key = Identifier(dead_id.0.wrapping_add(1));
        if crate::ring::in_arc(key, local_id, dead_id, true) {
            // extraordinarily unlikely wrap placement; nothing to assert
            return;
        }
        assert!(service.find_successor(key).await.is_err());
    }
}
