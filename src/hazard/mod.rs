//! Hazard-pointer subsystem (spec §4.2, §4.3): per-thread protection slots,
//! thread-local retirement, and scan-and-free reclamation.

mod registry;
mod retired;
mod retired_tree;

pub use registry::Registry;
pub use retired::RetiredArray;
pub use retired_tree::RetiredTree;

use std::collections::HashSet;

/// Maximum number of participating threads (spec §6).
pub const T_MAX: usize = 128;

/// Maximum hazard slots per thread; list operations use up to 4 of these
/// (spec §6, named `K` in the hazard-pointer paper).
pub const K: usize = 5;

/// Scan threshold: the reference design scans on every retirement (spec §6,
/// named `R`). Correctness does not depend on this value; raising it only
/// amortizes scan cost.
pub const R: usize = 0;

/// Upper bound on addresses any one thread may have retired and not yet
/// reclaimed at once (spec §3: `T_MAX * K`, the system-wide bound on
/// simultaneously-protected addresses).
pub const RETIRED_MAX: usize = T_MAX * K;

/// A thread-local bag of addresses pending reclamation (spec §4.3).
///
/// Implementations choose their own internal representation (flat array,
/// ordered tree, ...) but must honor this contract: `add` never silently
/// drops an address, `drain_reclaimable` calls `reclaim` on exactly the
/// addresses not present in `hazardous` and removes them from the set, and
/// `drain_all` reclaims everything unconditionally (used at registry
/// teardown).
pub trait RetiredSet: Default {
    /// Appends `addr` to this thread's retired set.
    ///
    /// # Panics
    ///
    /// Panics if the set already holds `RETIRED_MAX` addresses: this means
    /// the hazard-pointer protection contract was violated somewhere (spec
    /// §4.2 "Failure semantics").
    fn add(&mut self, addr: usize);

    /// Number of addresses currently retired and not yet reclaimed.
    fn size(&self) -> usize;

    /// Reclaims every retired address not present in `hazardous`, in any
    /// order, calling `reclaim` once per address and removing it from the
    /// set. Addresses still present in `hazardous` are left retired.
    fn drain_reclaimable(&mut self, hazardous: &HashSet<usize>, reclaim: &mut dyn FnMut(usize));

    /// Unconditionally reclaims every retired address, ignoring hazards.
    /// Only safe to call when no concurrent participant can still be
    /// dereferencing these addresses (i.e. at registry teardown).
    fn drain_all(&mut self, reclaim: &mut dyn FnMut(usize));
}
