//! Ordered lock-free list (spec §4.5, C5): two variants sharing the same
//! node representation and hazard-pointer registry.

mod node;
mod ordered;
mod simple;

pub use node::Key;
pub use ordered::OrderedSet;
pub use simple::SimpleSet;

#[cfg(not(feature = "check-loom"))]
use core::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "check-loom")]
use loom::sync::atomic::{AtomicUsize, Ordering};

use crate::align;
use crate::hazard::Registry;
use node::Node;

/// Publishes `observed` (already stripped of its mark) into hazard slot
/// `idx`, then re-reads `source`; returns `Some(observed)` if it still
/// matches (the hazard is validated) or `None` if it changed (the caller
/// must restart its walk). This is the re-check pattern spec §4.2 requires
/// around every hazard publication that precedes a dereference.
pub(crate) fn protect_and_validate<K: Key>(
    hp: &Registry<Node<K>>,
    idx: usize,
    source: &AtomicUsize,
    observed: usize,
) -> Option<usize> {
    hp.hp_protect_release(idx, align::without_mark(observed));
    if source.load(Ordering::Acquire) == observed {
        Some(observed)
    } else {
        None
    }
}

/// Counts a restarted traversal or a lost CAS race (spec §11 analysis
/// counters); a no-op unless the `stats` feature is enabled.
#[inline]
pub(crate) fn record_retry() {
    #[cfg(feature = "stats")]
    crate::stats::record_cas_retry();
}

/// The outcome of a traversal (spec §4.5.1): the location that must be
/// CAS'd to change the list at `curr`, `curr`'s address (unmarked), and
/// whether `curr`'s key equals the key searched for.
pub(crate) struct FindResult {
    pub prev_field: *const AtomicUsize,
    pub curr: usize,
    pub found: bool,
}
