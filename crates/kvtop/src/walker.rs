//! Generic N-level page-table walker.

use crate::{
    ArchProfile, DumpAddress, ENTRY_SIZE, EntryKind, Geometry, Level, LevelGeometry, MemoryReader,
    PhysicalAddress, TableEntry, TranslateError, VirtualAddress,
};

/// The outcome of a successful walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    /// Physical address the virtual address maps to.
    pub physical: PhysicalAddress,
    /// Level whose entry terminated the walk.
    pub level: Level,
    /// Size of the page or block that was mapped.
    pub size: u64,
}

impl Translation {
    fn new(address: VirtualAddress, base: PhysicalAddress, geometry: &LevelGeometry) -> Self {
        let size = geometry.size();
        Self {
            physical: base | address.offset_within(size),
            level: geometry.level(),
            size,
        }
    }

    /// Returns true if the walk ended on a block mapping rather than a last-level page.
    pub fn is_block(&self) -> bool {
        self.level != Level::Pte
    }
}

/// Walks the kernel page tables captured in a dump.
///
/// The walker is driven entirely by the [`Geometry`]; it never branches on the table
/// depth. Indexed levels read one entry from the dump. Folded levels read nothing and
/// reuse the parent entry, which is classified at the deepest level of the folded run,
/// so a block in a 3-level tree is recognized at PUD size.
pub struct Walker<'a, R: MemoryReader + ?Sized> {
    profile: &'a dyn ArchProfile,
    geometry: &'a Geometry,
    reader: &'a R,
    root: PhysicalAddress,
}

impl<'a, R: MemoryReader + ?Sized> Walker<'a, R> {
    /// Creates a walker starting at the root table at physical `root`.
    pub fn new(
        profile: &'a dyn ArchProfile,
        geometry: &'a Geometry,
        reader: &'a R,
        root: PhysicalAddress,
    ) -> Self {
        Self {
            profile,
            geometry,
            reader,
            root,
        }
    }

    pub fn root(&self) -> PhysicalAddress {
        self.root
    }

    /// Translates `address` by walking the tables.
    pub fn walk(&self, address: VirtualAddress) -> Result<Translation, TranslateError> {
        let levels = self.geometry.levels();

        let mut table = self.root;
        let mut entry = TableEntry::default();
        // Level the current entry was read at; folded levels don't change it.
        let mut read_level = Level::Pgd;

        log::trace!("walking {address} from root table {}", self.root);

        for (i, level) in levels.iter().enumerate() {
            if level.is_indexed() {
                let entry_address = table + level.index(address) * ENTRY_SIZE;
                let raw = self
                    .reader
                    .read_u64(DumpAddress::Physical(entry_address))
                    .map_err(|source| TranslateError::ReadFailure {
                        level: level.level(),
                        entry_address,
                        source,
                    })?;
                entry = TableEntry::new(raw);
                read_level = level.level();
                log::trace!("  {}: {} => {:#018x}", level.level(), entry_address, raw);
            }

            if levels.get(i + 1).is_some_and(LevelGeometry::is_folded) {
                continue;
            }

            match self.profile.classify(entry, level) {
                EntryKind::Table(next) => table = next,
                EntryKind::Block(base) | EntryKind::Page(base) => {
                    let translation = Translation::new(address, base, level);
                    log::trace!(
                        "  {} mapping of {:#x} bytes => {}",
                        translation.level,
                        translation.size,
                        translation.physical
                    );
                    return Ok(translation);
                }
                EntryKind::Absent => {
                    return Err(TranslateError::PageNotPresent {
                        level: read_level,
                        address,
                    });
                }
                EntryKind::Invalid => {
                    return Err(TranslateError::InvalidEntry {
                        level: read_level,
                        entry: entry.raw(),
                        address,
                    });
                }
            }
        }

        // A table pointer at the last level.
        Err(TranslateError::InvalidEntry {
            level: Level::Pte,
            entry: entry.raw(),
            address,
        })
    }
}
