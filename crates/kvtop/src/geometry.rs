//! Page-table geometry derived from a platform configuration.
//!
//! Every supported architecture uses radix tables of 8-byte entries filling one page, so
//! each level resolves `page_shift - 3` bits of the virtual address:
//!
//! ```text
//! | ... | PGD | PUD | PMD | PTE | page offset |
//!                               ^ page_shift
//!                         ^ page_shift + b
//!                   ^ page_shift + 2b
//!             ^ page_shift + (depth - 1) * b      (b = page_shift - 3)
//! ```
//!
//! Shallower configurations fold levels away. A folded level owns no address bits and
//! its table is the parent's table, so the walker reuses the parent entry instead of
//! reading memory:
//!
//! | depth | PGD     | PUD    | PMD     | PTE     |
//! |:------|:--------|:-------|:--------|:--------|
//! | 2     | indexed | folded | folded  | indexed |
//! | 3     | indexed | folded | indexed | indexed |
//! | 4     | indexed | indexed| indexed | indexed |

use core::fmt;

use crate::{ArchProfile, ConfigError, PageConfig, TableDepth, VirtualAddress};

/// Size in bytes of one table entry.
pub const ENTRY_SIZE: u64 = 8;

/// A page-table level, from the root down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Pgd,
    Pud,
    Pmd,
    Pte,
}

impl Level {
    pub const fn name(self) -> &'static str {
        match self {
            Level::Pgd => "pgd",
            Level::Pud => "pud",
            Level::Pmd => "pmd",
            Level::Pte => "pte",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a level has a table of its own for the current depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelMode {
    /// The level has its own table, indexed by a slice of the virtual address.
    Indexed,
    /// The level aliases its parent's table; no read happens.
    Folded,
}

/// Constants describing one level of the table tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelGeometry {
    level: Level,
    mode: LevelMode,
    shift: u32,
    index_bits: u32,
    granule_shift: u32,
    block_capable: bool,
}

impl LevelGeometry {
    pub const fn level(&self) -> Level {
        self.level
    }

    pub const fn is_folded(&self) -> bool {
        matches!(self.mode, LevelMode::Folded)
    }

    pub const fn is_indexed(&self) -> bool {
        matches!(self.mode, LevelMode::Indexed)
    }

    /// Lowest virtual-address bit resolved by this level.
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// Number of entries in a table at this level. One when folded.
    pub const fn entry_count(&self) -> u64 {
        1 << self.index_bits
    }

    /// Bytes of address space covered by one entry at this level.
    ///
    /// This is also the size of a block mapping produced here.
    pub const fn size(&self) -> u64 {
        1 << self.shift
    }

    /// Mask selecting the bits above the region covered by one entry.
    pub const fn mask(&self) -> u64 {
        !(self.size() - 1)
    }

    /// Mask selecting granule-aligned bits, used for table pointers and page bases.
    ///
    /// Tables are aligned to the translation granule, which is the page size.
    pub const fn granule_mask(&self) -> u64 {
        !((1u64 << self.granule_shift) - 1)
    }

    /// Returns true if an entry classified at this level may map a block directly.
    pub const fn block_capable(&self) -> bool {
        self.block_capable
    }

    /// Returns true if this is the last level of the tree.
    pub const fn is_leaf_level(&self) -> bool {
        matches!(self.level, Level::Pte)
    }

    /// Returns the index into this level's table for `address`.
    pub const fn index(&self, address: VirtualAddress) -> u64 {
        (address.as_u64() >> self.shift) & (self.entry_count() - 1)
    }
}

/// The complete per-level geometry for one platform configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    page: PageConfig,
    depth: TableDepth,
    levels: [LevelGeometry; 4],
}

impl Geometry {
    /// Derives the geometry for a page configuration and table depth.
    ///
    /// `profile` decides which levels may hold block mappings. Errors mean the inputs
    /// describe an impossible tree, not that the dump is damaged.
    pub fn derive(
        page: PageConfig,
        depth: TableDepth,
        profile: &dyn ArchProfile,
    ) -> Result<Self, ConfigError> {
        let page_shift = page.page_shift();
        let va_bits = page.va_bits();

        if !(10..=20).contains(&page_shift) {
            return Err(ConfigError::InvalidGeometry("page shift out of range"));
        }
        if va_bits > 64 {
            return Err(ConfigError::InvalidGeometry("more than 64 VA bits"));
        }

        let bits = page_shift - 3;
        let pgd_shift = page_shift + (depth.levels() - 1) * bits;
        if va_bits <= pgd_shift {
            return Err(ConfigError::InvalidGeometry("VA bits below the root"));
        }

        let level = |level: Level, mode: LevelMode, shift: u32, index_bits: u32| {
            let block_capable = level != Level::Pte && profile.block_capable(page, shift);
            LevelGeometry {
                level,
                mode,
                shift,
                index_bits,
                granule_shift: page_shift,
                block_capable,
            }
        };

        let pud_shift = page_shift + 2 * bits;
        let pmd_shift = page_shift + bits;

        let root_bits = va_bits - pgd_shift;
        let pgd = level(Level::Pgd, LevelMode::Indexed, pgd_shift, root_bits);
        let pud = match depth {
            TableDepth::Four => level(Level::Pud, LevelMode::Indexed, pud_shift, bits),
            _ => level(Level::Pud, LevelMode::Folded, pgd_shift, 0),
        };
        let pmd = match depth {
            TableDepth::Two => level(Level::Pmd, LevelMode::Folded, pgd_shift, 0),
            _ => level(Level::Pmd, LevelMode::Indexed, pmd_shift, bits),
        };
        let pte = level(Level::Pte, LevelMode::Indexed, page_shift, bits);

        Ok(Self {
            page,
            depth,
            levels: [pgd, pud, pmd, pte],
        })
    }

    pub const fn page(&self) -> PageConfig {
        self.page
    }

    pub const fn depth(&self) -> TableDepth {
        self.depth
    }

    /// All levels, root first.
    pub fn levels(&self) -> &[LevelGeometry; 4] {
        &self.levels
    }

    /// Returns the geometry of one level.
    pub fn level(&self, level: Level) -> &LevelGeometry {
        match level {
            Level::Pgd => &self.levels[0],
            Level::Pud => &self.levels[1],
            Level::Pmd => &self.levels[2],
            Level::Pte => &self.levels[3],
        }
    }

    /// Size in bytes of the root table.
    pub fn root_table_size(&self) -> u64 {
        self.levels[0].entry_count() * ENTRY_SIZE
    }
}
