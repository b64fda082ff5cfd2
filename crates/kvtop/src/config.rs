//! Platform configuration resolved once from the dump metadata.

use crate::{Arch, ArchProfile, ConfigError, DumpMetadata, Geometry, HumanSize, VirtualAddress};

/// Page size and virtual-address width of the crashed kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageConfig {
    page_shift: u32,
    va_bits: u32,
}

impl PageConfig {
    pub const fn new(page_shift: u32, va_bits: u32) -> Self {
        Self {
            page_shift,
            va_bits,
        }
    }

    pub const fn page_shift(self) -> u32 {
        self.page_shift
    }

    pub const fn page_size(self) -> u64 {
        1 << self.page_shift
    }

    pub const fn va_bits(self) -> u32 {
        self.va_bits
    }
}

/// Number of page-table levels the kernel was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableDepth {
    Two,
    Three,
    Four,
}

impl TableDepth {
    pub const fn levels(self) -> u32 {
        match self {
            TableDepth::Two => 2,
            TableDepth::Three => 3,
            TableDepth::Four => 4,
        }
    }
}

/// An inclusive range of kernel virtual addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub start: u64,
    pub end: u64,
}

impl Region {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub const fn contains(&self, address: VirtualAddress) -> bool {
        let addr = address.as_u64();
        addr >= self.start && addr <= self.end
    }
}

/// Boundaries of the kernel virtual address space regions.
///
/// Addresses in the linear map translate arithmetically. The vmalloc, vmemmap and module
/// regions are mapped page by page and always need a table walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelLayout {
    /// Virtual address at which physical `phys_base` is linearly mapped.
    pub page_offset: u64,
    pub linear: Region,
    pub vmalloc: Region,
    pub vmemmap: Region,
    pub modules: Region,
}

impl KernelLayout {
    /// Returns true if `address` is in a region that is only reachable through the tables.
    pub const fn needs_table_walk(&self, address: VirtualAddress) -> bool {
        self.vmalloc.contains(address)
            || self.vmemmap.contains(address)
            || self.modules.contains(address)
    }

    pub const fn is_linear(&self, address: VirtualAddress) -> bool {
        self.linear.contains(address)
    }
}

/// The resolved platform configuration.
///
/// Constructed once by [`PlatformConfig::resolve`] and never mutated afterwards; the
/// translator and walker only ever borrow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    arch: Arch,
    page: PageConfig,
    table_depth: TableDepth,
    phys_base: u64,
    image_voffset: Option<u64>,
    max_physical_bits: u32,
    layout: KernelLayout,
}

impl PlatformConfig {
    /// Resolves the configuration of the crashed kernel from the dump metadata.
    ///
    /// Resolution is deterministic: identical metadata always yields an identical value.
    pub fn resolve(arch: Arch, meta: &dyn DumpMetadata) -> Result<Self, ConfigError> {
        let profile = arch.profile();

        let page = profile.page_config(meta)?;
        let unsupported = ConfigError::Unsupported {
            page_size: page.page_size(),
            va_bits: page.va_bits(),
        };
        let table_depth = profile.table_depth(page).ok_or(unsupported)?;
        let geometry = Geometry::derive(page, table_depth, profile)?;
        let phys_base = profile.phys_base(meta)?;
        let image_voffset = profile.image_voffset(meta, phys_base);
        let layout = profile.kernel_layout(&geometry, meta);

        let config = Self {
            arch,
            page,
            table_depth,
            phys_base,
            image_voffset,
            max_physical_bits: profile.max_physical_bits(),
            layout,
        };
        config.log_summary();
        Ok(config)
    }

    fn log_summary(&self) {
        log::debug!("arch             : {}", self.arch);
        log::debug!("page size        : {}", HumanSize(self.page.page_size()));
        log::debug!("va_bits          : {}", self.page.va_bits());
        log::debug!("pgtable levels   : {}", self.table_depth.levels());
        log::debug!("phys_base        : {:#x}", self.phys_base);
        if let Some(voffset) = self.image_voffset {
            log::debug!("image voffset    : {voffset:#x}");
        }
        log::debug!("max_physmem_bits : {}", self.max_physical_bits);
        log::debug!("page_offset      : {:#x}", self.layout.page_offset);
        log::debug!("vmalloc_start    : {:#x}", self.layout.vmalloc.start);
        log::debug!("vmalloc_end      : {:#x}", self.layout.vmalloc.end);
        log::debug!("vmemmap_start    : {:#x}", self.layout.vmemmap.start);
        log::debug!("vmemmap_end      : {:#x}", self.layout.vmemmap.end);
        log::debug!("modules_start    : {:#x}", self.layout.modules.start);
        log::debug!("modules_end      : {:#x}", self.layout.modules.end);
    }

    pub const fn arch(&self) -> Arch {
        self.arch
    }

    /// Returns the architecture profile this configuration was resolved with.
    pub fn profile(&self) -> &'static dyn ArchProfile {
        self.arch.profile()
    }

    pub const fn page(&self) -> PageConfig {
        self.page
    }

    pub const fn page_shift(&self) -> u32 {
        self.page.page_shift()
    }

    pub const fn page_size(&self) -> u64 {
        self.page.page_size()
    }

    pub const fn va_bits(&self) -> u32 {
        self.page.va_bits()
    }

    pub const fn table_depth(&self) -> TableDepth {
        self.table_depth
    }

    /// Physical address backing the start of the linear map.
    pub const fn phys_base(&self) -> u64 {
        self.phys_base
    }

    /// Offset between kernel image virtual addresses and their physical location.
    pub const fn image_voffset(&self) -> Option<u64> {
        self.image_voffset
    }

    pub const fn max_physical_bits(&self) -> u32 {
        self.max_physical_bits
    }

    /// Mask covering every bit a physical address may use.
    pub const fn physical_mask(&self) -> u64 {
        physical_mask(self.max_physical_bits)
    }

    pub const fn layout(&self) -> &KernelLayout {
        &self.layout
    }

    /// Derives the table geometry for this configuration.
    pub fn geometry(&self) -> Result<Geometry, ConfigError> {
        Geometry::derive(self.page, self.table_depth, self.profile())
    }
}

/// Returns a mask of the low `bits` bits.
pub(crate) const fn physical_mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1 << bits) - 1 }
}

/// Returns the lowest physical start address of all loadable segments.
pub(crate) fn lowest_segment_start(meta: &dyn DumpMetadata) -> Option<u64> {
    meta.load_segments()
        .iter()
        .map(|segment| segment.physical_start)
        .min()
}
