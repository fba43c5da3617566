//! A lock-free ordered set of word-sized keys, reclaimed with hazard
//! pointers.
//!
//! Two list variants are exposed: [`OrderedSet`] (Harris-Michael, `find`
//! helps unlink logically-deleted nodes it passes) and [`SimpleSet`] (a
//! simpler traversal that never helps, pushing all unlinking work onto
//! `delete`). Both are built on the same node representation and the same
//! [`hazard::Registry`] for safe memory reclamation.

pub mod align;
pub mod hazard;
mod list;
#[cfg(feature = "stats")]
pub mod stats;
mod thread_id;

pub use list::{Key, OrderedSet, SimpleSet};

#[cfg(test)]
mod integration {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn insert_delete_race_on_distinct_keys() {
        let set = Arc::new(OrderedSet::<u32>::new());
        let a = {
            let set = set.clone();
            thread::spawn(move || {
                for k in 0..128u32 {
                    set.insert(k);
                }
            })
        };
        let b = {
            let set = set.clone();
            thread::spawn(move || {
                for k in 0..128u32 {
                    set.delete(k);
                }
            })
        };
        a.join().unwrap();
        b.join().unwrap();

        // Final sweep, as the driver does after join.
        for k in 0..128u32 {
            set.delete(k);
        }
        for k in 0..128u32 {
            assert!(!set.contains(k));
        }
    }

    #[test]
    fn duplicate_delete_tolerance() {
        let set = Arc::new(OrderedSet::<u32>::new());
        assert!(set.insert(99));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = set.clone();
                thread::spawn(move || set.delete(99))
            })
            .collect();
        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // At least one deleter must report success; this variant helps, so
        // in practice every racer observes the key as gone and reports
        // `true`.
        assert!(results.iter().any(|&r| r));
        assert!(!set.contains(99));
    }

    #[test]
    fn scaled_down_stress_workload_balances() {
        let set = Arc::new(OrderedSet::<usize>::new());
        let grid: Arc<Vec<[u64; 16]>> = Arc::new(vec![[0u64; 16]; 8]);

        let handles: Vec<_> = (0..8)
            .map(|row| {
                let set = set.clone();
                let grid = grid.clone();
                thread::spawn(move || {
                    let keys: Vec<usize> =
                        (0..16).map(|i| &grid[row][i] as *const u64 as usize).collect();
                    if row % 2 == 0 {
                        for &k in &keys {
                            set.insert(k);
                        }
                    } else {
                        for &k in &keys {
                            set.delete(k);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut residue = 0usize;
        for row in 0..8 {
            for i in 0..16 {
                if set.delete(&grid[row][i] as *const u64 as usize) {
                    residue += 1;
                }
            }
        }
        assert_eq!(residue, 4 * 16);
    }

    /// Property-style check of P1 (set semantics) and P2 (order invariant):
    /// a random sequence of inserts/deletes/contains on a small key space
    /// must never leave the list unsorted or holding a marked node, and the
    /// live key set must always match a plain `HashSet` shadow model.
    #[test]
    fn randomized_operations_preserve_set_and_order_invariants() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::HashSet;

        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let set: OrderedSet<u16> = OrderedSet::new();
        let mut shadow: HashSet<u16> = HashSet::new();

        for _ in 0..2000 {
            let key: u16 = rng.gen_range(0, 64);
            match rng.gen_range(0, 3) {
                0 => {
                    let inserted = set.insert(key);
                    assert_eq!(inserted, shadow.insert(key));
                }
                1 => {
                    let deleted = set.delete(key);
                    assert_eq!(deleted, shadow.remove(&key));
                }
                _ => {
                    assert_eq!(set.contains(key), shadow.contains(&key));
                }
            }
        }

        let keys = set.debug_keys();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(keys, sorted, "live keys must be strictly increasing head to tail");

        let mut shadow_sorted: Vec<u16> = shadow.into_iter().collect();
        shadow_sorted.sort_unstable();
        assert_eq!(keys, shadow_sorted, "live keys must match the shadow model");
    }

    #[test]
    fn simple_variant_matches_primary_on_sequential_workload() {
        let set: SimpleSet<u32> = SimpleSet::new();
        for k in (0..200u32).step_by(3) {
            assert!(set.insert(k));
        }
        for k in (0..200u32).step_by(3) {
            assert!(set.contains(k));
        }
        for k in (0..200u32).step_by(3) {
            assert!(set.delete(k));
        }
        for k in (0..200u32).step_by(3) {
            assert!(!set.contains(k));
        }
    }

    /// P6 (lock-freedom): with every other thread spinning on the busiest
    /// possible contention point (repeatedly inserting/deleting the same
    /// key), a lone thread doing its own unrelated sequence of operations
    /// must still complete them all, not stall behind a preempted or
    /// slow peer. True CPU pinning would need a platform-affinity crate the
    /// teacher's stack never pulls in for this kind of code; maximal shared-
    /// key CAS contention is the practical stand-in. If any operation here
    /// could block on another thread rather than retry past it, the
    /// `recv_timeout` below would fire.
    #[test]
    fn lone_thread_completes_under_spinning_contention() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::mpsc;
        use std::time::Duration;

        let set = Arc::new(OrderedSet::<u32>::new());
        let stop = Arc::new(AtomicBool::new(false));

        let spinners: Vec<_> = (0..7)
            .map(|_| {
                let set = set.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        set.insert(0);
                        set.delete(0);
                    }
                })
            })
            .collect();

        let (tx, rx) = mpsc::channel();
        let worker_set = set.clone();
        thread::spawn(move || {
            for k in 1..=200u32 {
                worker_set.insert(k);
                worker_set.contains(k);
                worker_set.delete(k);
            }
            let _ = tx.send(());
        });

        rx.recv_timeout(Duration::from_secs(10)).expect(
            "lone thread must finish its operations while others spin; \
             a timeout here means some operation blocked instead of retrying",
        );

        stop.store(true, Ordering::Relaxed);
        for h in spinners {
            h.join().unwrap();
        }
    }
}
