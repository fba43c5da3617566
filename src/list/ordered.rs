//! Primary ordered-set variant (spec §4.5): Harris-Michael lock-free sorted
//! singly-linked list with hazard-pointer-protected traversal.
//!
//! Grounded on `original_source/orderedv2.c`'s `__list_find_ordered` /
//! `list_insert_conti` / `list_delete_once`, with one deliberate deviation:
//! the C unlinks an entire run of consecutive marked nodes with a single CAS
//! (`CAS(prev, &tmp, get_unmarked(curr))`, where `tmp` is read as
//! `get_unmarked(curr)` immediately before the call). That makes expected ==
//! desired == `curr` whenever `*prev` has already been confirmed to differ
//! from `curr` a few lines earlier, which means the CAS can never succeed —
//! almost certainly a bug in the reference rather than an intentional
//! batch-unlink technique. `examples/other_examples/...hazptr...ordered.rs`
//! (a real hazard-pointer ordered set) instead unlinks one marked node at a
//! time, immediately retiring it; this file follows that, documented in full
//! in the project's design ledger.

#[cfg(not(feature = "check-loom"))]
use core::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "check-loom")]
use loom::sync::atomic::{AtomicUsize, Ordering};

use crate::align;
use crate::hazard::Registry;

use super::node::{Key, Node};
use super::{protect_and_validate, record_retry, FindResult};

const HP_NEXT: usize = 0;
const HP_CURR: usize = 1;
const HP_PREV: usize = 2;
const MAX_HPS: usize = 3;

/// A lock-free ordered set of `K`, implemented as a Harris-Michael sorted
/// singly-linked list guarded by hazard pointers.
pub struct OrderedSet<K: Key> {
    head: usize,
    tail: usize,
    hp: Registry<Node<K>>,
}

impl<K: Key> OrderedSet<K> {
    /// Builds an empty set: two sentinel nodes keyed `K::MIN`/`K::MAX` (spec
    /// §3), linked head -> tail.
    pub fn new() -> Self {
        let head = Node::<K>::new(K::MIN);
        let tail = Node::<K>::new(K::MAX);
        unsafe { &*head }.next.store(tail as usize, Ordering::Relaxed);
        Self {
            head: head as usize,
            tail: tail as usize,
            hp: Registry::new(MAX_HPS),
        }
    }

    fn node(&self, addr: usize) -> &Node<K> {
        let node = unsafe { &*(addr as *const Node<K>) };
        node.check_not_freed();
        node
    }

    fn next_field(&self, addr: usize) -> *const AtomicUsize {
        &self.node(addr).next as *const AtomicUsize
    }

    fn head_next_field(&self) -> *const AtomicUsize {
        self.next_field(self.head)
    }

    /// Traversal (spec §4.5.1). Walks from `start` (always `head`'s `next`
    /// field for the public operations below), protecting every pointer it
    /// dereferences with a hazard slot and re-validating the publication
    /// against its source before trusting it. Physically unlinks any
    /// logically-deleted node it passes (one CAS per node) and retires it —
    /// this is the "helping" half of Harris-Michael.
    fn find(&self, key: K, start: *const AtomicUsize) -> FindResult {
        'retry: loop {
            let mut prev = start;
            let raw = unsafe { &*prev }.load(Ordering::Acquire);
            let Some(raw) = protect_and_validate(&self.hp, HP_CURR, unsafe { &*prev }, raw)
            else {
                record_retry();
                continue 'retry;
            };
            let mut curr = align::without_mark(raw);

            loop {
                if curr == self.tail {
                    return FindResult {
                        prev_field: prev,
                        curr,
                        found: false,
                    };
                }

                let curr_node = self.node(curr);
                let raw_next = curr_node.next.load(Ordering::Acquire);
                let Some(raw_next) =
                    protect_and_validate(&self.hp, HP_NEXT, &curr_node.next, raw_next)
                else {
                    record_retry();
                    continue 'retry;
                };

                if align::is_marked(raw_next) {
                    let next = align::without_mark(raw_next);
                    match unsafe { &*prev }.compare_exchange(
                        curr,
                        next,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            self.hp.hp_retire(curr);
                            self.hp.hp_protect_release(HP_CURR, next);
                            curr = next;
                            continue;
                        }
                        Err(_) => {
                            record_retry();
                            continue 'retry;
                        }
                    }
                }

                if curr_node.key < key {
                    self.hp.hp_protect_release(HP_PREV, curr);
                    prev = self.next_field(curr);
                    let next = align::without_mark(raw_next);
                    self.hp.hp_protect_release(HP_CURR, next);
                    curr = next;
                    continue;
                }

                return FindResult {
                    prev_field: prev,
                    curr,
                    found: curr_node.key == key,
                };
            }
        }
    }

    /// Inserts `key` if absent. Returns `true` if it was inserted, `false`
    /// if it was already present (spec §4.5.2).
    pub fn insert(&self, key: K) -> bool {
        let node_ptr = Node::new(key);
        loop {
            let found = self.find(key, self.head_next_field());
            if found.found {
                self.hp.hp_clear();
                drop(unsafe { Box::from_raw(node_ptr) });
                return false;
            }
            unsafe { &*node_ptr }.next.store(found.curr, Ordering::Relaxed);
            let cas = unsafe { &*found.prev_field }.compare_exchange(
                found.curr,
                node_ptr as usize,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            match cas {
                Ok(_) => {
                    self.hp.hp_clear();
                    return true;
                }
                Err(_) => {
                    record_retry();
                    continue;
                }
            }
        }
    }

    /// Deletes `key` if present. Returns `true` if this call (or a racing
    /// deleter of the same key) removed it, `false` if it was never present
    /// (spec §4.5.3). Physical unlinking after the logical mark is
    /// best-effort: a CAS failure here means some other traversal already
    /// completed it, so the key is gone either way (spec §9 Open Question 1:
    /// mark-success is the linearization point, not the unlink).
    pub fn delete(&self, key: K) -> bool {
        let found = self.find(key, self.head_next_field());
        if !found.found {
            self.hp.hp_clear();
            return false;
        }

        let curr_node = self.node(found.curr);
        let prior = curr_node.next.fetch_or(align::MARK, Ordering::AcqRel);
        if align::is_marked(prior) {
            self.hp.hp_clear();
            return true;
        }

        let next = align::without_mark(prior);
        let cas = unsafe { &*found.prev_field }.compare_exchange(
            found.curr,
            next,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.hp.hp_clear();
        if cas.is_ok() {
            self.hp.hp_retire(found.curr);
        }
        true
    }

    /// Reports whether `key` is currently present (spec §4.5.4).
    pub fn contains(&self, key: K) -> bool {
        let found = self.find(key, self.head_next_field());
        self.hp.hp_clear();
        found.found
    }

    /// Single-threaded snapshot of every live (unmarked) key in order, for
    /// checking the order invariant (spec P2) in tests. Only sound to call
    /// when no other thread is concurrently mutating the set.
    #[cfg(test)]
    pub(crate) fn debug_keys(&self) -> Vec<K> {
        let mut keys = Vec::new();
        let mut curr = unsafe { &*(self.head as *const Node<K>) }
            .next
            .load(Ordering::Relaxed);
        while align::without_mark(curr) != self.tail {
            let node = self.node(align::without_mark(curr));
            keys.push(node.key);
            curr = node.next.load(Ordering::Relaxed);
        }
        keys
    }
}

impl<K: Key> Default for OrderedSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> Drop for OrderedSet<K> {
    /// Frees every node still physically linked (head, tail, and any
    /// surviving real nodes). Nodes that were already retired at this point
    /// are disjoint from this walk (retirement always follows unlinking), so
    /// there is no double free; the `Registry`'s own `Drop` (run afterwards,
    /// as a struct field) reclaims those separately.
    fn drop(&mut self) {
        let mut curr = self.head;
        loop {
            let ptr = curr as *mut Node<K>;
            let next_raw = unsafe { (*ptr).next.load(Ordering::Relaxed) };
            let is_tail = curr == self.tail;
            #[cfg(feature = "stats")]
            crate::stats::record_free();
            drop(unsafe { Box::from_raw(ptr) });
            if is_tail {
                break;
            }
            curr = align::without_mark(next_raw);
        }
    }
}

// Safety: `head`/`tail` are plain addresses of heap nodes owned by this set;
// all access to the nodes they point to goes through hazard-protected loads,
// same as `hp`'s own Send/Sync argument.
unsafe impl<K: Key> Send for OrderedSet<K> {}
unsafe impl<K: Key> Sync for OrderedSet<K> {}
