//! Architecture profiles.
//!
//! Everything that differs between CPU families lives behind [`ArchProfile`]: how the
//! page configuration is inferred, which table depths exist, which levels can hold block
//! mappings, how raw entries decode, and where the kernel puts its address regions. The
//! walker and translator stay architecture neutral and never branch on depth.

pub mod arm64;
pub mod x86_64;

use core::fmt;

use crate::{
    ConfigError, DumpMetadata, Geometry, KernelLayout, LevelGeometry, PageConfig, PhysicalAddress,
    TableDepth, TableEntry, config::lowest_segment_start,
};

/// The CPU family a dump was captured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Arm64,
    X86_64,
}

impl Arch {
    /// Returns the profile implementing this architecture.
    pub fn profile(self) -> &'static dyn ArchProfile {
        match self {
            Arch::Arm64 => &arm64::Arm64,
            Arch::X86_64 => &x86_64::X86_64,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::X86_64 => "x86_64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a raw entry reads at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Points at the next table down.
    Table(PhysicalAddress),
    /// Maps a block the size of the level directly.
    Block(PhysicalAddress),
    /// Maps a single page (last level only).
    Page(PhysicalAddress),
    /// The valid/present bit is clear.
    Absent,
    /// A bit pattern that is not legal at this level.
    Invalid,
}

/// Architecture-specific knowledge needed to resolve and walk page tables.
pub trait ArchProfile: Sync {
    fn arch(&self) -> Arch;

    /// Widest physical address the MMU produces. Entry addresses are masked to it.
    fn max_physical_bits(&self) -> u32;

    /// Symbol holding the kernel's root page table.
    fn root_table_symbol(&self) -> &'static str;

    /// Infers page size and VA width from the metadata.
    fn page_config(&self, meta: &dyn DumpMetadata) -> Result<PageConfig, ConfigError>;

    /// Returns the table depth for a page configuration, or `None` if the kernel can't
    /// have been built that way.
    fn table_depth(&self, page: PageConfig) -> Option<TableDepth>;

    /// Returns true if an entry resolving address bits from `shift` up may be a block.
    fn block_capable(&self, page: PageConfig, shift: u32) -> bool;

    /// Classifies a raw entry read at `level`.
    fn classify(&self, entry: TableEntry, level: &LevelGeometry) -> EntryKind;

    /// Physical address backing the start of the linear map.
    ///
    /// Defaults to the lowest physical load address of the dump segments.
    fn phys_base(&self, meta: &dyn DumpMetadata) -> Result<u64, ConfigError> {
        lowest_segment_start(meta).ok_or(ConfigError::Unresolved)
    }

    /// Offset between kernel image virtual addresses and physical ones, when known.
    fn image_voffset(&self, meta: &dyn DumpMetadata, phys_base: u64) -> Option<u64>;

    /// Lays out the kernel's virtual regions.
    fn kernel_layout(&self, geometry: &Geometry, meta: &dyn DumpMetadata) -> KernelLayout;
}
