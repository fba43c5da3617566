//! List node representation (spec §3): a heap node with an immutable key,
//! a tagged `next` word, and (in debug builds) a use-after-free guard.

#[cfg(not(feature = "check-loom"))]
use core::sync::atomic::AtomicUsize;
#[cfg(feature = "check-loom")]
use loom::sync::atomic::AtomicUsize;

/// A key usable in the ordered set: a word-sized, totally ordered value with
/// sentinels that bound every real key (spec §3: "Sentinels use the minimum
/// and maximum possible values").
pub trait Key: Copy + Ord + Send + Sync + 'static {
    /// Compares less than or equal to every possible real key.
    const MIN: Self;
    /// Compares greater than or equal to every possible real key.
    const MAX: Self;
}

macro_rules! impl_key_for_uint {
    ($($t:ty),* $(,)?) => {
        $(impl Key for $t {
            const MIN: Self = <$t>::MIN;
            const MAX: Self = <$t>::MAX;
        })*
    };
}
impl_key_for_uint!(u8, u16, u32, u64, u128, usize);

/// Sentinel word written into every freshly allocated node; matches
/// `orderedv2.c`'s `LIST_MAGIC`.
const LIST_MAGIC: u32 = 0xDEAD_BEAF;

/// A node in the ordered list. 128-byte aligned for cache-line isolation,
/// matching `orderedv2.c`'s `alignas(128)` (spec §6).
#[repr(align(128))]
pub(crate) struct Node<K> {
    #[cfg(debug_assertions)]
    magic: u32,
    pub(crate) key: K,
    /// Tagged pointer: the address of the successor node with the low bit
    /// stolen as the logical-deletion mark (spec §4.4).
    pub(crate) next: AtomicUsize,
}

impl<K: Key> Node<K> {
    pub(crate) fn new(key: K) -> *mut Self {
        #[cfg(feature = "stats")]
        crate::stats::record_allocation();
        Box::into_raw(Box::new(Self {
            #[cfg(debug_assertions)]
            magic: LIST_MAGIC,
            key,
            next: AtomicUsize::new(0),
        }))
    }

    /// Confirms this node has not been freed and its memory reused for
    /// something else (spec P4: "every node read during `find` has valid
    /// `magic` at the moment of `key` comparison"). The hazard-pointer
    /// protection contract is what actually *prevents* this; this assertion
    /// only turns a protection-contract violation into a loud crash instead
    /// of silent corruption, and only in debug builds.
    #[inline]
    pub(crate) fn check_not_freed(&self) {
        #[cfg(debug_assertions)]
        assert_eq!(
            self.magic, LIST_MAGIC,
            "use-after-free: node magic corrupted, hazard-pointer contract violated"
        );
    }
}
