//! Array-backed retired set (spec §4.3, "array variant"): O(1) add, O(n)
//! compacting removal, order-preserving — the direct analogue of
//! `orderedv2.c`'s `retirelist_t`.

use std::collections::HashSet;

use super::{RetiredSet, RETIRED_MAX};

/// A bounded, order-preserving bag of retired addresses.
#[derive(Default)]
pub struct RetiredArray {
    addrs: Vec<usize>,
}

impl RetiredSet for RetiredArray {
    fn add(&mut self, addr: usize) {
        assert!(
            self.addrs.len() < RETIRED_MAX,
            "retired set overflow ({} addresses): hazard-pointer protection contract violated",
            RETIRED_MAX
        );
        self.addrs.push(addr);
    }

    fn size(&self) -> usize {
        self.addrs.len()
    }

    fn drain_reclaimable(&mut self, hazardous: &HashSet<usize>, reclaim: &mut dyn FnMut(usize)) {
        // Compact in place, keeping the relative order of survivors, mirroring
        // the backward `memmove` shift the C reference performs.
        let mut kept = Vec::with_capacity(self.addrs.len());
        for addr in self.addrs.drain(..) {
            if hazardous.contains(&addr) {
                kept.push(addr);
            } else {
                reclaim(addr);
            }
        }
        self.addrs = kept;
    }

    fn drain_all(&mut self, reclaim: &mut dyn FnMut(usize)) {
        for addr in self.addrs.drain(..) {
            reclaim(addr);
        }
    }
}
