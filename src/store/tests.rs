//! Storage Module Tests
//!
//! Validates version assignment, replica acceptance and the ownership
//! predicate backing the `put` routing checks.

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::ring::{Identifier, PeerHandle};
    use crate::store::{KvStore, Record, owns_key};

    fn peer(id: u128) -> PeerHandle {
        PeerHandle {
            id: Identifier(id),
            endpoint: format!("node-{id}:6501"),
        }
    }

    // ============================================================
    // VERSION TESTS
    // ============================================================

    #[test]
    fn test_local_put_assigns_monotonic_versions() {
        let store = KvStore::new();
        let key = Identifier(42);

        assert_eq!(store.local_put(key, b"one".to_vec()), 1);
        assert_eq!(store.local_put(key, b"two".to_vec()), 2);
        assert_eq!(store.local_put(Identifier(7), b"other".to_vec()), 1);

        let record = store.local_get(key).unwrap();
        assert_eq!(record.value, b"two");
        assert_eq!(record.version, 2);
    }

    #[test]
    fn test_accept_replica_keeps_newer_version() {
        let store = KvStore::new();
        let key = Identifier(42);
        store.local_put(key, b"v1".to_vec());
        store.local_put(key, b"v2".to_vec());

        // stale replica is refused, reporting the version the store kept
        match store.accept_replica(Record {
            key,
            value: b"stale".to_vec(),
            version: 1,
        }) {
            Err(StoreError::VersionStale { current, offered }) => {
                assert_eq!(current, 2);
                assert_eq!(offered, 1);
            }
            other => panic!("expected VersionStale, got {other:?}"),
        }
        assert_eq!(store.local_get(key).unwrap().value, b"v2");

        // newer replica replaces
        let stored = store
            .accept_replica(Record {
                key,
                value: b"newer".to_vec(),
                version: 9,
            })
            .unwrap();
        assert_eq!(stored, 9);
        assert_eq!(store.local_get(key).unwrap().value, b"newer");
    }

    #[test]
    fn test_accept_replica_is_idempotent() {
        let store = KvStore::new();
        let record = Record {
            key: Identifier(1),
            value: b"x".to_vec(),
            version: 3,
        };

        assert_eq!(store.accept_replica(record.clone()).unwrap(), 3);
        // the retry is stale by definition and leaves the record untouched
        assert!(store.accept_replica(record).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_and_missing_key() {
        let store = KvStore::new();
        let key = Identifier(5);

        assert!(store.local_get(key).is_none());
        assert!(!store.local_delete(key));

        store.local_put(key, b"v".to_vec());
        assert!(store.local_delete(key));
        assert!(store.local_get(key).is_none());
    }

    // ============================================================
    // RANGE TESTS
    // ============================================================

    #[test]
    fn test_records_in_arc_wraps_around() {
        let store = KvStore::new();
        for key in [2u128, 8, 14] {
            store.local_put(Identifier(key), key.to_string().into_bytes());
        }

        // arc (10, 5] wraps through zero: picks up 14 and 2, not 8
        let mut keys: Vec<u128> = store
            .records_in_arc(Identifier(10), Identifier(5))
            .into_iter()
            .map(|r| r.key.0)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![2, 14]);
    }

    #[test]
    fn test_records_in_arc_inclusive_right() {
        let store = KvStore::new();
        store.local_put(Identifier(5), b"edge".to_vec());

        assert_eq!(store.records_in_arc(Identifier(0), Identifier(5)).len(), 1);
        assert!(store.records_in_arc(Identifier(5), Identifier(9)).is_empty());
    }

    // ============================================================
    // OWNERSHIP TESTS
    // ============================================================

    #[test]
    fn test_owns_key_with_known_predecessor() {
        let local = peer(10);
        let pred = peer(4);

        assert!(owns_key(Identifier(7), Some(&pred), &local));
        assert!(owns_key(Identifier(10), Some(&pred), &local), "own id inclusive");
        assert!(!owns_key(Identifier(4), Some(&pred), &local), "predecessor exclusive");
        assert!(!owns_key(Identifier(12), Some(&pred), &local));
    }

    #[test]
    fn test_owns_key_wrapping_arc() {
        let local = peer(3);
        let pred = peer(200);

        assert!(owns_key(Identifier(250), Some(&pred), &local));
        assert!(owns_key(Identifier(1), Some(&pred), &local));
        assert!(!owns_key(Identifier(100), Some(&pred), &local));
    }

    #[test]
    fn test_owns_everything_without_predecessor() {
        let local = peer(10);
        assert!(owns_key(Identifier(999), None, &local));
        // a self-predecessor (singleton bootstrap) behaves the same
        assert!(owns_key(Identifier(999), Some(&peer(10)), &local));
    }
}
