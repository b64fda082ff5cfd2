//! Address types for the two address spaces of a crash dump.
//!
//! Virtual and physical addresses are both plain 64-bit integers in a dump, which makes
//! them very easy to mix up. These newtypes keep them apart: nothing converts one into
//! the other except the translator.

use core::fmt;
use core::ops::{Add, BitOr, Sub};

/// Macro to define common address type functionality.
///
/// Dump addresses come from untrusted data, so unlike a live kernel's address types
/// these never validate canonicality or width on construction.
macro_rules! impl_address_common {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new address.
            #[inline]
            pub const fn new(addr: u64) -> Self {
                Self(addr)
            }

            /// Returns the raw address value.
            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// Returns the offset of this address within a region of the given size.
            ///
            /// # Panics
            ///
            /// Panics if `size` is not a power of two.
            #[inline]
            pub const fn offset_within(self, size: u64) -> u64 {
                assert!(size.is_power_of_two(), "size must be a power of two");
                self.0 & (size - 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(&self.0, f)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(addr: u64) -> Self {
                Self::new(addr)
            }
        }

        impl From<$name> for u64 {
            #[inline]
            fn from(addr: $name) -> Self {
                addr.0
            }
        }

        impl Add<u64> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: u64) -> Self::Output {
                Self(self.0.wrapping_add(rhs))
            }
        }

        impl Sub<u64> for $name {
            type Output = Self;

            #[inline]
            fn sub(self, rhs: u64) -> Self::Output {
                Self(self.0.wrapping_sub(rhs))
            }
        }

        impl Sub<$name> for $name {
            type Output = u64;

            #[inline]
            fn sub(self, rhs: $name) -> Self::Output {
                self.0.wrapping_sub(rhs.0)
            }
        }
    };
}

impl_address_common!(
    PhysicalAddress,
    "A physical address inside the captured memory image."
);

impl PhysicalAddress {
    /// Keeps only the address bits selected by `mask`.
    ///
    /// Used to strip attribute and tag bits from addresses pulled out of table entries.
    #[inline]
    pub const fn masked(self, mask: u64) -> Self {
        Self(self.0 & mask)
    }
}

/// Combines a region base with an in-region offset.
impl BitOr<u64> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: u64) -> Self::Output {
        Self(self.0 | rhs)
    }
}

impl_address_common!(
    VirtualAddress,
    "A kernel virtual address as seen by the crashed kernel.\n\n\
     Page-table indices are extracted through [`crate::LevelGeometry::index`], since \
     their bit positions depend on the resolved platform configuration."
);

/// An address tagged with the address space it belongs to.
///
/// This is what raw reads are addressed with, so a reader can never be handed an
/// untagged integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpAddress {
    /// A kernel virtual address.
    Virtual(VirtualAddress),
    /// A physical address.
    Physical(PhysicalAddress),
}

impl DumpAddress {
    /// Returns the raw address value, regardless of the address space.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        match self {
            Self::Virtual(addr) => addr.as_u64(),
            Self::Physical(addr) => addr.as_u64(),
        }
    }
}

impl fmt::Display for DumpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Virtual(addr) => write!(f, "virtual {addr}"),
            Self::Physical(addr) => write!(f, "physical {addr}"),
        }
    }
}

impl From<VirtualAddress> for DumpAddress {
    fn from(addr: VirtualAddress) -> Self {
        Self::Virtual(addr)
    }
}

impl From<PhysicalAddress> for DumpAddress {
    fn from(addr: PhysicalAddress) -> Self {
        Self::Physical(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod physical_address {
        use super::*;

        #[test]
        fn keeps_full_width() {
            let addr = PhysicalAddress::new(0xFFFF_0000_4000_0000);
            assert_eq!(addr.as_u64(), 0xFFFF_0000_4000_0000);
        }

        #[test]
        fn masked_strips_high_bits() {
            let addr = PhysicalAddress::new(0x0040_0000_8000_1000);
            let mask = (1u64 << 48) - 1;
            assert_eq!(addr.masked(mask), PhysicalAddress::new(0x8000_1000));
        }

        #[test]
        fn bitor_combines_base_and_offset() {
            let base = PhysicalAddress::new(0x4000_0000);
            assert_eq!(base | 0x123, PhysicalAddress::new(0x4000_0123));
        }

        #[test]
        fn entry_slot_arithmetic() {
            let table = PhysicalAddress::new(0x4010_0000);
            assert_eq!(table + 5 * 8, PhysicalAddress::new(0x4010_0028));
            assert_eq!(PhysicalAddress::new(0x4010_0028) - table, 0x28);
        }

        #[test]
        fn display_format() {
            let addr = PhysicalAddress::new(0x4000_0123);
            assert_eq!(format!("{}", addr), "0x40000123");
            assert_eq!(format!("{:?}", addr), "PhysicalAddress(0x40000123)");
        }
    }

    mod virtual_address {
        use super::*;

        #[test]
        fn offset_within() {
            let addr = VirtualAddress::new(0xFFFF_FFC0_0020_1123);
            assert_eq!(addr.offset_within(0x1000), 0x123);
            assert_eq!(addr.offset_within(0x20_0000), 0x1123);
        }

        #[test]
        fn subtraction_wraps_like_the_kernel() {
            let addr = VirtualAddress::new(0xFFFF_FFC0_0001_0000);
            assert_eq!(addr - 0xFFFF_FFC0_0000_0000, VirtualAddress::new(0x1_0000));
            assert_eq!(
                VirtualAddress::new(0x10) - 0x20,
                VirtualAddress::new(0xFFFF_FFFF_FFFF_FFF0)
            );
        }

        #[test]
        fn comparison_operators() {
            let low = VirtualAddress::new(0xFFFF_FF80_0000_0000);
            let high = VirtualAddress::new(0xFFFF_FFC0_0000_0000);
            assert!(low < high);
            assert_ne!(low, high);
        }

        #[test]
        fn debug_format() {
            let addr = VirtualAddress::new(0x100);
            assert_eq!(format!("{:?}", addr), "VirtualAddress(0x100)");
        }
    }

    mod dump_address {
        use super::*;

        #[test]
        fn tags_are_kept_apart() {
            let virt = DumpAddress::from(VirtualAddress::new(0x1000));
            let phys = DumpAddress::from(PhysicalAddress::new(0x1000));
            assert_ne!(virt, phys);
            assert_eq!(virt.as_u64(), phys.as_u64());
        }

        #[test]
        fn display_names_the_space() {
            let phys = DumpAddress::from(PhysicalAddress::new(0x1000));
            assert_eq!(format!("{}", phys), "physical 0x1000");
        }
    }
}
