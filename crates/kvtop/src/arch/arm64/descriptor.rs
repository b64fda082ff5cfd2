//! VMSAv8-64 translation table descriptors.

use crate::{PhysicalAddress, TableEntry};

/// A raw arm64 table descriptor.
///
/// The low two bits select the descriptor type:
/// - `0b11` at levels 0-2: table descriptor, pointing at the next level.
/// - `0b01` at levels 1-2: block descriptor, mapping a block of the level's size.
/// - `0bx0`: invalid (not present).
///
/// At the last level only the valid bit is checked; `0b11` is a page descriptor.
/// Output addresses live in bits 47..granule_shift; upper and lower attributes
/// (XN, contiguous, AF, SH, AP, ...) surround them and must be masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Descriptor(TableEntry);

impl Descriptor {
    /// Valid bit; also the "present" bit of last-level entries.
    pub const VALID: u64 = 1 << 0;

    /// Descriptor type bits.
    pub const TYPE_MASK: u64 = 0b11;

    pub const TYPE_TABLE: u64 = 0b11;

    pub const TYPE_BLOCK: u64 = 0b01;

    pub const fn new(entry: TableEntry) -> Self {
        Self(entry)
    }

    pub const fn is_valid(self) -> bool {
        self.0.has(Self::VALID)
    }

    pub const fn is_table(self) -> bool {
        self.0.bits(Self::TYPE_MASK) == Self::TYPE_TABLE
    }

    pub const fn is_block(self) -> bool {
        self.0.bits(Self::TYPE_MASK) == Self::TYPE_BLOCK
    }

    /// Extracts the output address, keeping only bits selected by both masks.
    ///
    /// `physical_mask` strips everything above the physical address width;
    /// `alignment_mask` strips the attribute bits below the granule or block boundary.
    pub const fn output_address(
        self,
        physical_mask: u64,
        alignment_mask: u64,
    ) -> PhysicalAddress {
        PhysicalAddress::new(self.0.raw()).masked(physical_mask & alignment_mask)
    }
}
