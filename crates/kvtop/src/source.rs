//! Collaborator interfaces through which the translator reaches the dump.

use crate::{DumpAddress, ReadError};

/// A loadable segment of the dump (an ELF `PT_LOAD` for vmcores).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadSegment {
    pub physical_start: u64,
    pub virtual_start: u64,
    pub file_offset: u64,
    /// Bytes present in the file.
    pub size: u64,
    /// Bytes covered in memory. Anything past `size` was not captured and reads as zero.
    pub memory_size: u64,
}

impl LoadSegment {
    /// Returns true if `[address, address + length)` lies inside the physical range.
    pub fn contains_physical(&self, address: u64, length: u64) -> bool {
        Self::range_contains(self.physical_start, self.memory_size, address, length)
    }

    /// Returns true if `[address, address + length)` lies inside the virtual range.
    pub fn contains_virtual(&self, address: u64, length: u64) -> bool {
        Self::range_contains(self.virtual_start, self.memory_size, address, length)
    }

    fn range_contains(start: u64, size: u64, address: u64, length: u64) -> bool {
        let Some(offset) = address.checked_sub(start) else {
            return false;
        };
        offset.checked_add(length).is_some_and(|end| end <= size)
    }
}

/// Symbol, constant and type metadata recorded in (or alongside) the dump.
pub trait DumpMetadata {
    /// Returns the stored value of a kernel symbol, if recorded.
    fn symbol(&self, name: &str) -> Option<u64>;

    /// Returns a recorded numeric constant, if present.
    fn number(&self, name: &str) -> Option<u64>;

    /// Returns the byte size of a named kernel structure, if recorded.
    fn structure_size(&self, name: &str) -> Option<u64>;

    /// Returns the loadable segments of the dump.
    ///
    /// The slice can be walked any number of times.
    fn load_segments(&self) -> &[LoadSegment];
}

/// Raw access to the bytes captured in the dump.
pub trait MemoryReader {
    /// Fills `buf` with the bytes at `address`.
    ///
    /// Reads never partially succeed: either all of `buf` is filled or an error is returned.
    fn read(&self, address: DumpAddress, buf: &mut [u8]) -> Result<(), ReadError>;

    /// Reads a little-endian 64-bit value.
    fn read_u64(&self, address: DumpAddress) -> Result<u64, ReadError> {
        let mut bytes = [0u8; 8];
        self.read(address, &mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }
}

impl<T: MemoryReader + ?Sized> MemoryReader for &T {
    fn read(&self, address: DumpAddress, buf: &mut [u8]) -> Result<(), ReadError> {
        (**self).read(address, buf)
    }

    fn read_u64(&self, address: DumpAddress) -> Result<u64, ReadError> {
        (**self).read_u64(address)
    }
}
