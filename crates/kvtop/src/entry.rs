//! Raw page-table entries as read from the dump.

use core::fmt;

/// A single raw page-table entry.
///
/// The value is kept exactly as captured. Interpreting it (table pointer, block or page
/// leaf, absent) is up to the active [`crate::ArchProfile`], since the bit layout is
/// architecture specific.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TableEntry(u64);

impl TableEntry {
    /// Creates an entry from its raw value.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this entry.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true if every bit in `mask` is set.
    #[inline]
    pub const fn has(self, mask: u64) -> bool {
        self.0 & mask == mask
    }

    /// Returns the entry bits selected by `mask`.
    #[inline]
    pub const fn bits(self, mask: u64) -> u64 {
        self.0 & mask
    }
}

impl From<u64> for TableEntry {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableEntry({:#018x})", self.0)
    }
}

impl fmt::LowerHex for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
