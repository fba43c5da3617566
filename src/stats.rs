//! Analysis counters (spec §11, supplemented from `orderedv2.c`'s
//! `#ifdef ANALYSIS_OPS` block), gated behind the `stats` feature so they
//! cost nothing in the default build. Useful chiefly for the P3 "no leaks"
//! testable property: `allocations == frees` once every set built during a
//! test is dropped.

#[cfg(not(feature = "check-loom"))]
use core::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "check-loom")]
use loom::sync::atomic::{AtomicU64, Ordering};

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static FREES: AtomicU64 = AtomicU64::new(0);
static CAS_RETRIES: AtomicU64 = AtomicU64::new(0);

/// Point-in-time reading of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub allocations: u64,
    pub frees: u64,
    pub cas_retries: u64,
}

pub(crate) fn record_allocation() {
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_free() {
    FREES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_cas_retry() {
    CAS_RETRIES.fetch_add(1, Ordering::Relaxed);
}

/// Reads every counter's current value. Process-wide, not per-set: useful
/// for a test that builds and tears down one set at a time and checks the
/// delta.
pub fn snapshot() -> Snapshot {
    Snapshot {
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
        frees: FREES.load(Ordering::Relaxed),
        cas_retries: CAS_RETRIES.load(Ordering::Relaxed),
    }
}

/// Zeroes every counter. Intended for test setup, not for production use
/// (there is no synchronization between a `reset` and concurrent recorders).
pub fn reset() {
    ALLOCATIONS.store(0, Ordering::Relaxed);
    FREES.store(0, Ordering::Relaxed);
    CAS_RETRIES.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_advance_and_reset() {
        reset();
        record_allocation();
        record_allocation();
        record_free();
        record_cas_retry();
        let snap = snapshot();
        assert_eq!(snap.allocations, 2);
        assert_eq!(snap.frees, 1);
        assert_eq!(snap.cas_retries, 1);
        reset();
        assert_eq!(snapshot(), Snapshot { allocations: 0, frees: 0, cas_retries: 0 });
    }
}
