//! Thread Identity Service (spec §4.1): assigns each participating thread a
//! dense small integer id, stable for the thread's lifetime.

#[cfg(not(feature = "check-loom"))]
use core::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "check-loom")]
use loom::sync::atomic::{AtomicUsize, Ordering};

use crate::hazard::T_MAX;

static TID_BASE: AtomicUsize = AtomicUsize::new(0);

#[cfg(not(feature = "check-loom"))]
thread_local! {
    static TID: usize = assign();
}

#[cfg(feature = "check-loom")]
loom::thread_local! {
    static TID: usize = assign();
}

fn assign() -> usize {
    // fetch_add returns the previous value, so the first caller gets 0.
    let id = TID_BASE.fetch_add(1, Ordering::Relaxed);
    assert!(
        id < T_MAX,
        "thread_id: more than T_MAX ({}) participating threads; no id recycling in this design",
        T_MAX
    );
    id
}

/// Returns this thread's dense id in `[0, T_MAX)`. The first call from a
/// given thread assigns the id (by atomically incrementing a process-wide
/// counter); subsequent calls from the same thread return the cached value.
///
/// There is no de-registration: ids are not recycled, which is fine for the
/// long-lived worker threads this design targets (spec §4.1). A production
/// variant that spawns many short-lived threads would need an explicit
/// register/unregister extension point, which this spec does not require.
pub fn thread_id() -> usize {
    TID.with(|&id| id)
}
