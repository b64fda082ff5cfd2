//! ELF core dump (`/proc/vmcore`) reader.

use std::{fs, path::Path};

use elf::{ElfBytes, abi, endian::AnyEndian};
use kvtop::{Arch, DumpAddress, LoadSegment, MemoryReader, ReadError};

use crate::Error;

/// Name of the note carrying the kernel's VMCOREINFO text.
const VMCOREINFO_NOTE: &[u8] = b"VMCOREINFO";

/// A crash dump in ELF core format.
///
/// Every `PT_LOAD` segment is one captured range of physical memory. Segments are
/// parsed once; reads are served straight from the file contents.
pub struct Vmcore {
    data: Vec<u8>,
    machine: u16,
    big_endian: bool,
    segments: Vec<LoadSegment>,
    vmcoreinfo: Option<String>,
}

impl Vmcore {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let data = fs::read(path).map_err(Error::io(path))?;
        Self::parse(data)
    }

    pub fn parse(data: Vec<u8>) -> Result<Self, Error> {
        let (machine, big_endian, segments, vmcoreinfo) = {
            let elf = ElfBytes::<AnyEndian>::minimal_parse(&data)?;
            if elf.ehdr.e_type != abi::ET_CORE {
                return Err(Error::NotCore(elf.ehdr.e_type));
            }
            let big_endian = matches!(elf.ehdr.endianness, AnyEndian::Big);

            let mut segments = Vec::new();
            let mut vmcoreinfo = None;
            for phdr in elf.segments().iter().flat_map(|table| table.iter()) {
                match phdr.p_type {
                    abi::PT_LOAD => segments.push(LoadSegment {
                        physical_start: phdr.p_paddr,
                        virtual_start: phdr.p_vaddr,
                        file_offset: phdr.p_offset,
                        size: phdr.p_filesz,
                        memory_size: phdr.p_memsz,
                    }),
                    abi::PT_NOTE if vmcoreinfo.is_none() => {
                        let notes = elf.segment_data(&phdr)?;
                        vmcoreinfo = find_note(notes, VMCOREINFO_NOTE, big_endian)
                            .map(|desc| String::from_utf8_lossy(desc).into_owned());
                    }
                    _ => {}
                }
            }

            (elf.ehdr.e_machine, big_endian, segments, vmcoreinfo)
        };

        log::debug!(
            "vmcore: machine {machine}, {} load segments, vmcoreinfo {}",
            segments.len(),
            if vmcoreinfo.is_some() { "present" } else { "missing" }
        );

        Ok(Self {
            data,
            machine,
            big_endian,
            segments,
            vmcoreinfo,
        })
    }

    /// Returns the architecture the dump was captured on, from `e_machine`.
    pub fn arch(&self) -> Result<Arch, Error> {
        match self.machine {
            abi::EM_AARCH64 => Ok(Arch::Arm64),
            abi::EM_X86_64 => Ok(Arch::X86_64),
            other => Err(Error::UnsupportedMachine(other)),
        }
    }

    pub fn segments(&self) -> &[LoadSegment] {
        &self.segments
    }

    /// Returns the VMCOREINFO note text, if the dump carries one.
    pub fn vmcoreinfo(&self) -> Option<&str> {
        self.vmcoreinfo.as_deref()
    }

    fn find_segment(&self, address: DumpAddress, length: u64) -> Option<(&LoadSegment, u64)> {
        self.segments.iter().find_map(|segment| match address {
            DumpAddress::Physical(addr) if segment.contains_physical(addr.as_u64(), length) => {
                Some((segment, addr.as_u64() - segment.physical_start))
            }
            DumpAddress::Virtual(addr) if segment.contains_virtual(addr.as_u64(), length) => {
                Some((segment, addr.as_u64() - segment.virtual_start))
            }
            _ => None,
        })
    }
}

impl MemoryReader for Vmcore {
    fn read(&self, address: DumpAddress, buf: &mut [u8]) -> Result<(), ReadError> {
        let length = buf.len();
        let (segment, offset) = self
            .find_segment(address, length as u64)
            .ok_or(ReadError::NotCaptured { address, length })?;

        // Bytes between p_filesz and p_memsz were not written out and read as zero.
        let in_file = segment.size.saturating_sub(offset).min(length as u64) as usize;
        let (captured, zeroed) = buf.split_at_mut(in_file);
        zeroed.fill(0);
        if in_file == 0 {
            return Ok(());
        }

        let truncated = ReadError::Truncated { address, length };
        let start = segment
            .file_offset
            .checked_add(offset)
            .and_then(|start| usize::try_from(start).ok())
            .ok_or(truncated)?;
        let source = start
            .checked_add(in_file)
            .and_then(|end| self.data.get(start..end))
            .ok_or(truncated)?;

        captured.copy_from_slice(source);
        Ok(())
    }

    fn read_u64(&self, address: DumpAddress) -> Result<u64, ReadError> {
        let mut bytes = [0u8; 8];
        self.read(address, &mut bytes)?;
        Ok(if self.big_endian {
            u64::from_be_bytes(bytes)
        } else {
            u64::from_le_bytes(bytes)
        })
    }
}

/// Finds the descriptor of the first note named `name` in a `PT_NOTE` segment.
///
/// Core notes use 4-byte header words and 4-byte padding on both ELF classes.
fn find_note<'a>(mut notes: &'a [u8], name: &[u8], big_endian: bool) -> Option<&'a [u8]> {
    let word = |bytes: &[u8]| -> Option<usize> {
        let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        let value = if big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        };
        usize::try_from(value).ok()
    };

    while notes.len() >= 12 {
        let namesz = word(notes)?;
        let descsz = word(&notes[4..])?;

        let name_start = 12;
        let desc_start = name_start + namesz.checked_add(3)? / 4 * 4;
        let next = desc_start + descsz.checked_add(3)? / 4 * 4;

        let note_name = notes.get(name_start..name_start + namesz)?;
        let desc = notes.get(desc_start..desc_start + descsz)?;

        if note_name.strip_suffix(b"\0").unwrap_or(note_name) == name {
            return Some(desc);
        }

        notes = notes.get(next..).unwrap_or_default();
    }

    None
}
