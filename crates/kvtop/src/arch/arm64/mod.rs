//! 64-bit ARM (AArch64) profile.
//!
//! arm64 kernels can be built with 4 KiB, 16 KiB or 64 KiB translation granules and a
//! range of VA widths, and the dump rarely records all of them. The profile takes what
//! VMCOREINFO records and falls back on the position of `_stext` for older kernels that
//! only ever shipped two configurations:
//!
//! | granule | VA bits | levels |
//! |:--------|:--------|:-------|
//! | 16K     | 36      | 2      |
//! | 64K     | 42      | 2      |
//! | 4K      | 39      | 3      |
//! | 16K     | 47      | 3      |
//! | 64K     | 48      | 3      |
//! | 4K/16K  | 48      | 4      |

mod descriptor;

pub use descriptor::Descriptor;

use crate::{
    Arch, ArchProfile, ConfigError, DumpMetadata, EntryKind, Geometry, KernelLayout, Level,
    LevelGeometry, PageConfig, Region, TableDepth, TableEntry, config::physical_mask,
};

/// Highest physical address bit supported (`PHYS_MASK_SHIFT`).
pub const MAX_PHYSICAL_BITS: u32 = 48;

/// VA width assumed when nothing in the dump says otherwise.
pub const DEFAULT_VA_BITS: u32 = 48;

/// Page shift assumed when nothing in the dump says otherwise.
pub const DEFAULT_PAGE_SHIFT: u32 = 12;

/// `sizeof(struct page)` for kernels whose dumps don't record it.
pub const DEFAULT_PAGE_STRUCT_SIZE: u64 = 64;

/// Size of the module region directly below `PAGE_OFFSET`.
const MODULES_SIZE: u64 = 0x400_0000;

/// Guard gap between the vmalloc and vmemmap regions.
const VMEMMAP_GUARD: u64 = 0x1_0000;

/// The arm64 profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct Arm64;

impl Arm64 {
    /// Guesses the configuration from where `_stext` lives.
    ///
    /// Only the two configurations early arm64 kernels supported can be told apart this
    /// way. The narrower VA width must be checked first, since a 39-bit kernel address
    /// also has all bits above 42 set.
    pub fn guess_from_stext(stext: u64) -> Option<PageConfig> {
        const PAGE_OFFSET_39: u64 = u64::MAX << 39;
        const PAGE_OFFSET_42: u64 = u64::MAX << 42;

        if stext & PAGE_OFFSET_39 == PAGE_OFFSET_39 {
            Some(PageConfig::new(12, 39))
        } else if stext & PAGE_OFFSET_42 == PAGE_OFFSET_42 {
            Some(PageConfig::new(16, 42))
        } else {
            None
        }
    }
}

impl ArchProfile for Arm64 {
    fn arch(&self) -> Arch {
        Arch::Arm64
    }

    fn max_physical_bits(&self) -> u32 {
        MAX_PHYSICAL_BITS
    }

    fn root_table_symbol(&self) -> &'static str {
        "swapper_pg_dir"
    }

    fn page_config(&self, meta: &dyn DumpMetadata) -> Result<PageConfig, ConfigError> {
        let guess = meta.symbol("_stext").and_then(Self::guess_from_stext);

        let recorded = meta
            .number("VA_BITS")
            .map(u32::try_from)
            .transpose()
            .map_err(|_| ConfigError::Unsupported {
                page_size: meta.number("PAGESIZE").unwrap_or(1 << DEFAULT_PAGE_SHIFT),
                va_bits: u32::MAX,
            })?;

        let va_bits = match (recorded, guess) {
            (Some(recorded), _) => recorded,
            (None, Some(guess)) => {
                log::debug!("VA_BITS guessed from _stext: {}", guess.va_bits());
                guess.va_bits()
            }
            (None, None) => {
                log::debug!("VA_BITS not recorded, assuming {DEFAULT_VA_BITS}");
                DEFAULT_VA_BITS
            }
        };

        let page_shift = match meta.number("PAGESIZE") {
            Some(size) if size.is_power_of_two() => size.trailing_zeros(),
            Some(size) => {
                return Err(ConfigError::Unsupported {
                    page_size: size,
                    va_bits,
                });
            }
            None => guess
                .filter(|guess| guess.va_bits() == va_bits)
                .map_or(DEFAULT_PAGE_SHIFT, PageConfig::page_shift),
        };

        if !matches!(page_shift, 12 | 14 | 16) {
            return Err(ConfigError::Unsupported {
                page_size: 1 << page_shift,
                va_bits,
            });
        }

        Ok(PageConfig::new(page_shift, va_bits))
    }

    fn table_depth(&self, page: PageConfig) -> Option<TableDepth> {
        match (page.page_shift(), page.va_bits()) {
            (14, 36) | (16, 42) => Some(TableDepth::Two),
            (16, 48) | (12, 39) | (14, 47) => Some(TableDepth::Three),
            (16, _) => None,
            (_, 48) => Some(TableDepth::Four),
            _ => None,
        }
    }

    fn block_capable(&self, page: PageConfig, shift: u32) -> bool {
        let level2 = page.page_shift() + (page.page_shift() - 3);
        shift == level2 || (page.page_shift() == 12 && shift == 30)
    }

    fn classify(&self, entry: TableEntry, level: &LevelGeometry) -> EntryKind {
        let desc = Descriptor::new(entry);
        let phys_mask = physical_mask(MAX_PHYSICAL_BITS);

        if level.is_leaf_level() {
            return if desc.is_valid() {
                EntryKind::Page(desc.output_address(phys_mask, level.granule_mask()))
            } else {
                EntryKind::Absent
            };
        }

        if desc.is_table() {
            EntryKind::Table(desc.output_address(phys_mask, level.granule_mask()))
        } else if desc.is_block() && level.block_capable() {
            EntryKind::Block(desc.output_address(phys_mask, level.mask()))
        } else if !desc.is_valid() {
            EntryKind::Absent
        } else {
            EntryKind::Invalid
        }
    }

    fn phys_base(&self, meta: &dyn DumpMetadata) -> Result<u64, ConfigError> {
        if let Some(offset) = meta.number("PHYS_OFFSET") {
            return Ok(offset);
        }

        // Segment LMAs are physical; the lowest one is where RAM starts.
        crate::config::lowest_segment_start(meta).ok_or(ConfigError::Unresolved)
    }

    fn image_voffset(&self, meta: &dyn DumpMetadata, _phys_base: u64) -> Option<u64> {
        meta.number("kimage_voffset")
    }

    fn kernel_layout(&self, geometry: &Geometry, meta: &dyn DumpMetadata) -> KernelLayout {
        let page = geometry.page();
        let va_bits = page.va_bits();

        let half = u64::MAX << (va_bits - 1);
        let page_offset = meta.symbol("_stext").map_or(half, |stext| stext & half);

        let page_struct_size = meta.structure_size("page").unwrap_or_else(|| {
            log::debug!("SIZE(page) missing, assuming {DEFAULT_PAGE_STRUCT_SIZE}");
            DEFAULT_PAGE_STRUCT_SIZE
        });
        let pud_size = geometry.level(Level::Pud).size();
        let vmemmap_size = align_up(
            (1u64 << (va_bits - page.page_shift())).wrapping_mul(page_struct_size),
            pud_size,
        );

        let vmalloc_start = u64::MAX << va_bits;
        let vmalloc_end = page_offset
            .wrapping_sub(pud_size)
            .wrapping_sub(vmemmap_size)
            .wrapping_sub(VMEMMAP_GUARD);
        let vmemmap_start = vmalloc_end.wrapping_add(VMEMMAP_GUARD);

        KernelLayout {
            page_offset,
            linear: Region::new(page_offset, u64::MAX),
            vmalloc: Region::new(vmalloc_start, vmalloc_end),
            vmemmap: Region::new(vmemmap_start, vmemmap_start.wrapping_add(vmemmap_size)),
            modules: Region::new(page_offset.wrapping_sub(MODULES_SIZE), page_offset),
        }
    }
}

const fn align_up(value: u64, align: u64) -> u64 {
    value.wrapping_add(align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PhysicalAddress, RecordedMetadata};

    fn geometry(page_shift: u32, va_bits: u32, depth: TableDepth) -> Geometry {
        Geometry::derive(PageConfig::new(page_shift, va_bits), depth, &Arm64).unwrap()
    }

    mod page_config {
        use super::*;

        #[test]
        fn recorded_values_win() {
            let meta = RecordedMetadata::new()
                .with_number("VA_BITS", 48)
                .with_number("PAGESIZE", 16384)
                .with_symbol("_stext", 0xFFFF_FFC0_0008_1000);
            assert_eq!(Arm64.page_config(&meta), Ok(PageConfig::new(14, 48)));
        }

        #[test]
        fn guesses_thirty_nine_bits_from_stext() {
            let meta = RecordedMetadata::new().with_symbol("_stext", 0xFFFF_FFC0_0008_1000);
            assert_eq!(Arm64.page_config(&meta), Ok(PageConfig::new(12, 39)));
        }

        #[test]
        fn guesses_forty_two_bits_from_stext() {
            let meta = RecordedMetadata::new().with_symbol("_stext", 0xFFFF_FE00_0008_1000);
            assert_eq!(Arm64.page_config(&meta), Ok(PageConfig::new(16, 42)));
        }

        #[test]
        fn guess_page_size_ignored_when_va_bits_disagree() {
            let meta = RecordedMetadata::new()
                .with_number("VA_BITS", 48)
                .with_symbol("_stext", 0xFFFF_FE00_0008_1000);
            assert_eq!(Arm64.page_config(&meta), Ok(PageConfig::new(12, 48)));
        }

        #[test]
        fn defaults_without_metadata() {
            let meta = RecordedMetadata::new();
            assert_eq!(
                Arm64.page_config(&meta),
                Ok(PageConfig::new(DEFAULT_PAGE_SHIFT, DEFAULT_VA_BITS))
            );
        }

        #[test]
        fn rejects_odd_page_sizes() {
            let meta = RecordedMetadata::new()
                .with_number("VA_BITS", 48)
                .with_number("PAGESIZE", 8192);
            assert_eq!(
                Arm64.page_config(&meta),
                Err(ConfigError::Unsupported {
                    page_size: 8192,
                    va_bits: 48
                })
            );
        }

        #[test]
        fn va_bits_beyond_u32_is_unsupported() {
            let meta = RecordedMetadata::new()
                .with_number("VA_BITS", (1 << 32) + 39)
                .with_number("PAGESIZE", 4096);
            assert_eq!(
                Arm64.page_config(&meta),
                Err(ConfigError::Unsupported {
                    page_size: 4096,
                    va_bits: u32::MAX
                })
            );
        }
    }

    mod table_depth {
        use super::*;

        fn depth(page_shift: u32, va_bits: u32) -> Option<TableDepth> {
            Arm64.table_depth(PageConfig::new(page_shift, va_bits))
        }

        #[test]
        fn two_levels() {
            assert_eq!(depth(14, 36), Some(TableDepth::Two));
            assert_eq!(depth(16, 42), Some(TableDepth::Two));
        }

        #[test]
        fn three_levels() {
            assert_eq!(depth(16, 48), Some(TableDepth::Three));
            assert_eq!(depth(12, 39), Some(TableDepth::Three));
            assert_eq!(depth(14, 47), Some(TableDepth::Three));
        }

        #[test]
        fn four_levels() {
            assert_eq!(depth(12, 48), Some(TableDepth::Four));
            assert_eq!(depth(14, 48), Some(TableDepth::Four));
        }

        #[test]
        fn unsupported() {
            assert_eq!(depth(12, 36), None);
            assert_eq!(depth(16, 52), None);
            assert_eq!(depth(12, 42), None);
        }
    }

    mod classify {
        use super::*;

        #[test]
        fn table_pointer_is_granule_aligned_and_masked() {
            let geo = geometry(12, 39, TableDepth::Three);
            let entry = TableEntry::new(0xFF00_0000_4010_1003);
            assert_eq!(
                Arm64.classify(entry, geo.level(Level::Pmd)),
                EntryKind::Table(PhysicalAddress::new(0x4010_1000))
            );
        }

        #[test]
        fn block_at_pmd_is_two_megabytes() {
            let geo = geometry(12, 39, TableDepth::Three);
            let entry = TableEntry::new(0x4060_0000 | 0x711);
            assert_eq!(
                Arm64.classify(entry, geo.level(Level::Pmd)),
                EntryKind::Block(PhysicalAddress::new(0x4060_0000))
            );
        }

        #[test]
        fn page_needs_only_the_valid_bit() {
            let geo = geometry(12, 39, TableDepth::Three);
            let pte = geo.level(Level::Pte);
            assert_eq!(
                Arm64.classify(TableEntry::new(0x4015_5001), pte),
                EntryKind::Page(PhysicalAddress::new(0x4015_5000))
            );
            assert_eq!(
                Arm64.classify(TableEntry::new(0x4015_5000), pte),
                EntryKind::Absent
            );
        }

        #[test]
        fn absent_intermediate_entry() {
            let geo = geometry(12, 39, TableDepth::Three);
            assert_eq!(
                Arm64.classify(TableEntry::new(0), geo.level(Level::Pmd)),
                EntryKind::Absent
            );
        }

        #[test]
        fn block_where_blocks_are_not_allowed() {
            let geo = geometry(12, 48, TableDepth::Four);
            assert_eq!(
                Arm64.classify(TableEntry::new(0x4000_0001), geo.level(Level::Pgd)),
                EntryKind::Invalid
            );
        }
    }

    mod layout {
        use super::*;

        #[test]
        fn thirty_nine_bit_layout() {
            let meta = RecordedMetadata::new()
                .with_symbol("_stext", 0xFFFF_FFC0_0008_1000)
                .with_structure_size("page", 64);
            let geo = geometry(12, 39, TableDepth::Three);
            let layout = Arm64.kernel_layout(&geo, &meta);

            assert_eq!(layout.page_offset, 0xFFFF_FFC0_0000_0000);
            assert_eq!(layout.vmalloc.start, 0xFFFF_FF80_0000_0000);
            // 2^27 pages * 64 bytes = 8 GiB of vmemmap, 1 GiB PUD guard
            assert_eq!(layout.vmalloc.end, 0xFFFF_FFBD_BFFF_0000);
            assert_eq!(layout.vmemmap.start, 0xFFFF_FFBD_C000_0000);
            assert_eq!(layout.vmemmap.end, 0xFFFF_FFBF_C000_0000);
            assert_eq!(layout.modules.start, 0xFFFF_FFBF_FC00_0000);
            assert_eq!(layout.modules.end, 0xFFFF_FFC0_0000_0000);
            assert_eq!(layout.linear.end, u64::MAX);
        }

        #[test]
        fn page_offset_without_stext() {
            let meta = RecordedMetadata::new();
            let geo = geometry(16, 42, TableDepth::Two);
            let layout = Arm64.kernel_layout(&geo, &meta);
            assert_eq!(layout.page_offset, 0xFFFF_FE00_0000_0000);
        }
    }
}
