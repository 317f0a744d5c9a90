//! Ring Module Tests
//!
//! Validates the identifier space and the node-state mutators.
//!
//! ## Test Scopes
//! - **Arc Predicate**: `in_arc` against an exhaustive linear scan on a small
//!   ring, including every wrap-around combination.
//! - **Hashing**: Determinism and rough uniformity of `hash_id`.
//! - **State Mutators**: Self-predecessor guard, successor-list elision and
//!   truncation, eviction and candidate ordering.

#[cfg(test)]
mod tests {
    use crate::ring::state::RingState;
    use crate::ring::{Identifier, PeerHandle, RING_BITS, hash_id, in_arc};

    fn peer(id: u128) -> PeerHandle {
        PeerHandle {
            id: Identifier(id),
            endpoint: format!("node-{id}:6501"),
        }
    }

    // ============================================================
    // IN_ARC TESTS
    // ============================================================

    /// Walks a 16-point ring and compares `in_arc` with a literal clockwise
    /// scan for every (x, a, b, inclusive) combination.
    #[test]
    fn test_in_arc_matches_exhaustive_scan() {
        const RING: u128 = 16;

        // clockwise walk from a (exclusive) to b
        let scan = |x: u128, a: u128, b: u128, inclusive_b: bool| -> bool {
            let mut cursor = (a + 1) % RING;
            while cursor != b {
                if cursor == x {
                    return true;
                }
                cursor = (cursor + 1) % RING;
            }
            inclusive_b && x == b
        };

        for a in 0..RING {
            for b in 0..RING {
                for x in 0..RING {
                    for inclusive_b in [false, true] {
                        // the scan above treats a == b as the empty/full arc
                        // boundary exactly like the predicate does: the walk
                        // covers the whole ring back around to b
                        let expected = if a == b {
                            x != a || inclusive_b
                        } else {
                            scan(x, a, b, inclusive_b)
                        };
                        let got =
                            in_arc(Identifier(x), Identifier(a), Identifier(b), inclusive_b);
                        assert_eq!(
                            got, expected,
                            "in_arc({x}, {a}, {b}, {inclusive_b}) mismatch"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_in_arc_wraparound() {
        // arc (14, 2] on a ring wraps through zero
        let a = Identifier(14);
        let b = Identifier(2);
        assert!(in_arc(Identifier(15), a, b, true));
        assert!(in_arc(Identifier(0), a, b, true));
        assert!(in_arc(Identifier(2), a, b, true));
        assert!(!in_arc(Identifier(2), a, b, false));
        assert!(!in_arc(Identifier(14), a, b, true));
        assert!(!in_arc(Identifier(7), a, b, true));
    }

    #[test]
    fn test_in_arc_full_ring_when_endpoints_equal() {
        let a = Identifier(5);
        assert!(in_arc(Identifier(9), a, a, true));
        assert!(in_arc(Identifier(5), a, a, true));
        assert!(in_arc(Identifier(9), a, a, false));
        assert!(!in_arc(Identifier(5), a, a, false));
    }

    // ============================================================
    // HASHING TESTS
    // ============================================================

    #[test]
    fn test_hash_id_deterministic() {
        assert_eq!(hash_id(b"node-1:6501"), hash_id(b"node-1:6501"));
        assert_ne!(hash_id(b"node-1:6501"), hash_id(b"node-2:6501"));
    }

    /// Coarse chi-square style check: 10k hashed keys spread over 16 buckets
    /// should leave every bucket within 40% of the expected count.
    #[test]
    fn test_hash_id_distribution() {
        const SAMPLES: usize = 10_000;
        const BUCKETS: usize = 16;

        let mut counts = [0usize; BUCKETS];
        for i in 0..SAMPLES {
            let id = hash_id(format!("key-{i}").as_bytes());
            let bucket = (id.0 >> (128 - 4)) as usize;
            counts[bucket] += 1;
        }

        let expected = SAMPLES / BUCKETS;
        for (bucket, &count) in counts.iter().enumerate() {
            assert!(
                count > expected * 6 / 10 && count < expected * 14 / 10,
                "bucket {bucket} count {count} is far from expected {expected}"
            );
        }
    }

    #[test]
    fn test_finger_start_wraps() {
        let id = Identifier(u128::MAX);
        assert_eq!(id.finger_start(0), Identifier(0));
        assert_eq!(Identifier(0).finger_start(3), Identifier(8));
    }

    #[test]
    fn test_identifier_hex_round_trip() {
        let id = hash_id(b"round-trip");
        let parsed: Identifier = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    // ============================================================
    // RING STATE TESTS
    // ============================================================

    #[test]
    fn test_new_state_is_singleton() {
        let state = RingState::new(peer(1), 4);
        assert!(state.is_singleton());
        assert!(state.predecessor.is_none());
        assert_eq!(state.successor().id, Identifier(1));
        assert_eq!(state.finger_table.len(), RING_BITS);
        assert!(state.finger_table.iter().all(|p| p.id == Identifier(1)));
    }

    #[test]
    fn test_set_predecessor_guards_against_self() {
        let mut state = RingState::new(peer(1), 4);
        state.update_successor_list(peer(5), vec![]);

        // on a non-singleton ring a self-predecessor is cleared
        state.set_predecessor(Some(peer(1)));
        assert!(state.predecessor.is_none());

        state.set_predecessor(Some(peer(9)));
        assert_eq!(state.predecessor.as_ref().unwrap().id, Identifier(9));
    }

    #[test]
    fn test_update_successor_list_elides_and_truncates() {
        let mut state = RingState::new(peer(1), 3);
        state.update_successor_list(
            peer(5),
            vec![peer(1), peer(5), peer(9), peer(12), peer(14)],
        );

        let ids: Vec<u128> = state.successor_list.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![5, 9, 12], "own id and duplicates dropped, truncated to r");
        assert_eq!(state.finger_table[0].id, Identifier(5));
    }

    #[test]
    fn test_adopt_successor_prepends() {
        let mut state = RingState::new(peer(1), 3);
        state.update_successor_list(peer(9), vec![peer(12)]);
        state.adopt_successor(peer(5));

        let ids: Vec<u128> = state.successor_list.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![5, 9, 12]);
    }

    #[test]
    fn test_evict_successor_head_promotes_and_exhausts() {
        let mut state = RingState::new(peer(1), 2);
        state.update_successor_list(peer(5), vec![peer(9)]);

        let promoted = state.evict_successor_head().unwrap();
        assert_eq!(promoted.id, Identifier(9));
        assert_eq!(state.successor().id, Identifier(9));

        assert!(state.evict_successor_head().is_none(), "list exhausted");
        assert_eq!(state.successor().id, Identifier(1), "falls back to self");
    }

    #[test]
    fn test_closest_preceding_peer_scans_down() {
        let mut state = RingState::new(peer(10), 4);
        state.set_finger(10, peer(40));
        state.set_finger(20, peer(90));
        state.update_successor_list(peer(25), vec![]);

        // looking up 60: finger 90 is past it, finger 40 precedes it
        assert_eq!(state.closest_preceding_peer(Identifier(60)).id, Identifier(40));
        // looking up 5 (wraps): 90 is the closest preceding peer
        assert_eq!(state.closest_preceding_peer(Identifier(5)).id, Identifier(90));
        // nothing precedes 12 but the node itself
        assert_eq!(state.closest_preceding_peer(Identifier(12)).id, Identifier(10));
    }

    #[test]
    fn test_lookup_candidates_ordered_and_deduped() {
        let mut state = RingState::new(peer(10), 4);
        state.set_finger(5, peer(40));
        state.set_finger(15, peer(40));
        state.set_finger(20, peer(90));
        state.update_successor_list(peer(25), vec![peer(40)]);

        let ids: Vec<u128> = state
            .lookup_candidates(Identifier(5))
            .into_iter()
            .map(|p| p.id.0)
            .collect();
        assert_eq!(ids, vec![90, 40, 25], "farthest first, deduped, no self");
    }

    #[test]
    fn test_known_peers_excludes_self() {
        let mut state = RingState::new(peer(10), 4);
        state.update_successor_list(peer(25), vec![peer(40)]);
        state.set_predecessor(Some(peer(90)));

        let mut ids: Vec<u128> = state.known_peers().into_iter().map(|p| p.id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![25, 40, 90]);
    }

    #[test]
    fn test_reset_to_singleton() {
        let mut state = RingState::new(peer(10), 4);
        state.update_successor_list(peer(25), vec![peer(40)]);
        state.set_predecessor(Some(peer(90)));

        state.reset_to_singleton();
        assert!(state.is_singleton());
        assert!(state.predecessor.is_none());
    }
}
