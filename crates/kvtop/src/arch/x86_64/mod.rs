//! x86_64 profile.
//!
//! Only 4-level paging with 4 KiB pages is supported. The direct map, vmalloc, vmemmap
//! and module areas sit at the fixed addresses of a kernel without KASLR.

mod entry;

pub use entry::PageEntry;

use crate::{
    Arch, ArchProfile, ConfigError, DumpMetadata, EntryKind, Geometry, KernelLayout, LevelGeometry,
    PageConfig, Region, TableDepth, TableEntry,
};

/// Maximum number of bits in a physical address on x86_64.
pub const MAX_PHYSICAL_BITS: u32 = 52;

/// Virtual address bits with 4-level paging.
pub const VA_BITS: u32 = 48;

/// Virtual address bits with 5-level paging.
pub const VA_BITS_L5: u32 = 57;

pub const PAGE_SHIFT: u32 = 12;

/// Base of the direct mapping of all physical memory.
pub const PAGE_OFFSET: u64 = 0xFFFF_8880_0000_0000;

/// Size of the direct mapping (64 TiB).
const DIRECT_MAP_SIZE: u64 = 1 << 46;

pub const VMALLOC_START: u64 = 0xFFFF_C900_0000_0000;
pub const VMALLOC_END: u64 = 0xFFFF_E8FF_FFFF_FFFF;
pub const VMEMMAP_START: u64 = 0xFFFF_EA00_0000_0000;
pub const VMEMMAP_END: u64 = 0xFFFF_EAFF_FFFF_FFFF;
pub const MODULES_VADDR: u64 = 0xFFFF_FFFF_A000_0000;
pub const MODULES_END: u64 = 0xFFFF_FFFF_FEFF_FFFF;

/// Virtual base of the kernel image mapping (`__START_KERNEL_map`).
pub const START_KERNEL_MAP: u64 = 0xFFFF_FFFF_8000_0000;

/// The x86_64 profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86_64;

impl ArchProfile for X86_64 {
    fn arch(&self) -> Arch {
        Arch::X86_64
    }

    fn max_physical_bits(&self) -> u32 {
        MAX_PHYSICAL_BITS
    }

    fn root_table_symbol(&self) -> &'static str {
        "init_top_pgt"
    }

    fn page_config(&self, meta: &dyn DumpMetadata) -> Result<PageConfig, ConfigError> {
        let va_bits = match meta.number("pgtable_l5_enabled") {
            Some(1) => VA_BITS_L5,
            _ => VA_BITS,
        };

        match meta.number("PAGESIZE") {
            None | Some(4096) => Ok(PageConfig::new(PAGE_SHIFT, va_bits)),
            Some(page_size) => Err(ConfigError::Unsupported { page_size, va_bits }),
        }
    }

    fn table_depth(&self, page: PageConfig) -> Option<TableDepth> {
        match (page.page_shift(), page.va_bits()) {
            (PAGE_SHIFT, VA_BITS) => Some(TableDepth::Four),
            _ => None,
        }
    }

    fn block_capable(&self, _page: PageConfig, shift: u32) -> bool {
        matches!(shift, 21 | 30)
    }

    fn classify(&self, entry: TableEntry, level: &LevelGeometry) -> EntryKind {
        let entry = PageEntry::new(entry);

        if !entry.is_present() {
            return EntryKind::Absent;
        }

        if level.is_leaf_level() {
            EntryKind::Page(entry.address(level.granule_mask()))
        } else if !entry.is_huge() {
            EntryKind::Table(entry.address(level.granule_mask()))
        } else if level.block_capable() {
            EntryKind::Block(entry.address(level.mask()))
        } else {
            EntryKind::Invalid
        }
    }

    fn phys_base(&self, _meta: &dyn DumpMetadata) -> Result<u64, ConfigError> {
        // The direct map always starts at physical zero.
        Ok(0)
    }

    fn image_voffset(&self, meta: &dyn DumpMetadata, _phys_base: u64) -> Option<u64> {
        let image_phys_base = meta.number("phys_base").unwrap_or(0);
        Some(START_KERNEL_MAP.wrapping_sub(image_phys_base))
    }

    fn kernel_layout(&self, _geometry: &Geometry, _meta: &dyn DumpMetadata) -> KernelLayout {
        KernelLayout {
            page_offset: PAGE_OFFSET,
            linear: Region::new(PAGE_OFFSET, PAGE_OFFSET + DIRECT_MAP_SIZE - 1),
            vmalloc: Region::new(VMALLOC_START, VMALLOC_END),
            vmemmap: Region::new(VMEMMAP_START, VMEMMAP_END),
            modules: Region::new(MODULES_VADDR, MODULES_END),
        }
    }
}
