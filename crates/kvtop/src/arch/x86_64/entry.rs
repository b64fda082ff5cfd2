//! Page table entry for the x86_64 architecture.

use crate::{PhysicalAddress, TableEntry};

/// A single x86_64 page table entry.
///
/// The same layout is used at every level: bits 12-51 hold a physical address, the
/// rest are flags. Bit 7 (PS) turns a PDPT or PD entry into a 1 GiB or 2 MiB leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageEntry(TableEntry);

impl PageEntry {
    /// Physical address bits (assuming 52-bit physical addresses).
    pub const ADDRESS_MASK: u64 = 0x000F_FFFF_FFFF_F000;

    pub const PRESENT: u64 = 1 << 0;

    /// Page size bit; marks a huge page above the last level.
    pub const HUGE_PAGE: u64 = 1 << 7;

    pub const fn new(entry: TableEntry) -> Self {
        Self(entry)
    }

    pub const fn is_present(self) -> bool {
        self.0.has(Self::PRESENT)
    }

    pub const fn is_huge(self) -> bool {
        self.0.has(Self::HUGE_PAGE)
    }

    /// Returns the physical address stored in this entry, cut down to `alignment_mask`.
    pub const fn address(self, alignment_mask: u64) -> PhysicalAddress {
        PhysicalAddress::new(self.0.raw()).masked(Self::ADDRESS_MASK & alignment_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_ignores_flags_and_nx() {
        let entry = PageEntry::new(TableEntry::new((1 << 63) | 0x1234_5000 | 0x63));
        assert!(entry.is_present());
        assert!(!entry.is_huge());
        assert_eq!(entry.address(u64::MAX), PhysicalAddress::new(0x1234_5000));
    }

    #[test]
    fn huge_page_alignment() {
        let entry = PageEntry::new(TableEntry::new(0x4020_0000 | 0xE3));
        assert!(entry.is_huge());
        assert_eq!(entry.address(!0x1F_FFFF), PhysicalAddress::new(0x4020_0000));
    }

    #[test]
    fn not_present() {
        let entry = PageEntry::new(TableEntry::new(0x1234_5000));
        assert!(!entry.is_present());
    }
}
