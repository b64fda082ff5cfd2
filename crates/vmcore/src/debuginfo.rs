//! Symbols and structure sizes from a `vmlinux` with debug info.

use std::{collections::HashMap, fs, path::Path};

use elf::{ElfBytes, endian::AnyEndian};
use gimli::{EndianSlice, RunTimeEndian, read::Dwarf};

use crate::Error;

/// What the kernel image knows that VMCOREINFO may not record.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    symbols: HashMap<String, u64>,
    structure_sizes: HashMap<String, u64>,
}

impl DebugInfo {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let data = fs::read(path).map_err(Error::io(path))?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let elf = ElfBytes::<AnyEndian>::minimal_parse(data)?;

        let mut symbols = HashMap::new();
        if let Some((symtab, strtab)) = elf.symbol_table()? {
            for symbol in symtab.iter().filter(|symbol| symbol.st_name != 0) {
                if let Ok(name) = strtab.get(symbol.st_name as usize) {
                    symbols.entry(name.to_owned()).or_insert(symbol.st_value);
                }
            }
        }

        let dwarf = load_debug_sections(&elf)?;
        let structure_sizes = collect_structure_sizes(&dwarf);

        log::debug!(
            "vmlinux: {} symbols, {} structure sizes",
            symbols.len(),
            structure_sizes.len()
        );

        Ok(Self {
            symbols,
            structure_sizes,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        symbols: HashMap<String, u64>,
        structure_sizes: HashMap<String, u64>,
    ) -> Self {
        Self {
            symbols,
            structure_sizes,
        }
    }

    pub fn symbol(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    pub fn structure_size(&self, name: &str) -> Option<u64> {
        self.structure_sizes.get(name).copied()
    }
}

fn load_debug_sections<'a>(
    elf: &ElfBytes<'a, AnyEndian>,
) -> Result<Dwarf<EndianSlice<'a, RunTimeEndian>>, gimli::Error> {
    let endian = match elf.ehdr.endianness {
        AnyEndian::Little => RunTimeEndian::Little,
        AnyEndian::Big => RunTimeEndian::Big,
    };

    Dwarf::load(|id| -> Result<_, gimli::Error> {
        let data: &[u8] = match elf.section_header_by_name(id.name()) {
            Ok(Some(header)) => match elf.section_data(&header) {
                Ok((data, None)) => data,
                Ok((_, Some(_))) => {
                    log::debug!("vmlinux: skipping compressed section {}", id.name());
                    &[]
                }
                Err(_) => &[],
            },
            _ => &[],
        };
        Ok(EndianSlice::new(data, endian))
    })
}

/// Collects the byte size of every named, fully defined structure type.
fn collect_structure_sizes(dwarf: &Dwarf<EndianSlice<'_, RunTimeEndian>>) -> HashMap<String, u64> {
    let mut sizes = HashMap::new();

    let mut units = dwarf.units();
    while let Ok(Some(header)) = units.next() {
        let unit = match dwarf.unit(header) {
            Ok(unit) => unit,
            Err(_) => continue,
        };

        let mut entries = unit.entries();
        while let Ok(Some((_, entry))) = entries.next_dfs() {
            if entry.tag() != gimli::DW_TAG_structure_type {
                continue;
            }

            let mut name = None;
            let mut byte_size = None;
            let mut declaration = false;

            let mut attrs = entry.attrs();
            while let Ok(Some(attr)) = attrs.next() {
                match attr.name() {
                    gimli::DW_AT_name => {
                        name = dwarf
                            .attr_string(&unit, attr.value())
                            .ok()
                            .map(|s| s.to_string_lossy().into_owned());
                    }
                    gimli::DW_AT_byte_size => byte_size = attr.udata_value(),
                    gimli::DW_AT_declaration => declaration = true,
                    _ => {}
                }
            }

            if declaration {
                continue;
            }
            if let (Some(name), Some(size)) = (name, byte_size) {
                sizes.entry(name).or_insert(size);
            }
        }
    }

    sizes
}
