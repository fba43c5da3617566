//! Bit-stealing helpers for the mark bit carried in the low bit of a tagged
//! node address (spec §4.4).
//!
//! A list node's `next` field is stored as a plain machine word: the address
//! of the successor with its low bit repurposed as a logical-deletion flag.
//! Every load of such a word must be stripped with [`without_mark`] before
//! the address is dereferenced; every store or CAS must make the new mark
//! bit explicit via [`with_mark`]/[`without_mark`].

use static_assertions::const_assert;

/// The mark bit. Node storage must be at least 2-byte aligned for this bit
/// to be otherwise always zero in a real address.
pub const MARK: usize = 0b1;

const_assert!(core::mem::align_of::<usize>() >= 2);

/// `true` if `word`'s mark bit is set, i.e. the node it addresses is
/// logically deleted (spec I2).
#[inline(always)]
pub const fn is_marked(word: usize) -> bool {
    word & MARK != 0
}

/// Sets the mark bit, leaving the address untouched.
#[inline(always)]
pub const fn with_mark(word: usize) -> usize {
    word | MARK
}

/// Clears the mark bit, recovering the plain node address.
#[inline(always)]
pub const fn without_mark(word: usize) -> usize {
    word & !MARK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let addr = 0x7f00_1234_usize & !MARK;
        assert!(!is_marked(addr));
        assert!(is_marked(with_mark(addr)));
        assert_eq!(without_mark(with_mark(addr)), addr);
        assert_eq!(without_mark(addr), addr);
    }
}
