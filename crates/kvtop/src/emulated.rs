//! In-memory stand-ins for a real dump, for testing and development.
//!
//! [`EmulatedMemory`] is a block of "physical" memory at an arbitrary base address with a
//! bump allocator for page tables, and [`RecordedMetadata`] holds hand-written symbols and
//! constants. Together they let page-table trees be built and walked without a vmcore.

use std::collections::HashMap;

use crate::{
    DumpAddress, DumpMetadata, ENTRY_SIZE, LoadSegment, MemoryReader, PhysicalAddress, ReadError,
};

/// Emulated physical memory.
///
/// Only physical reads are answered; anything else, or anything outside the buffer,
/// reports [`ReadError::NotCaptured`].
pub struct EmulatedMemory {
    base: u64,
    memory: Vec<u8>,
    /// Next allocation offset (simple bump allocator).
    next_alloc: u64,
}

impl EmulatedMemory {
    /// Creates `size` bytes of zeroed memory starting at physical `base`.
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            memory: vec![0u8; size],
            next_alloc: 0,
        }
    }

    /// Allocates a block of memory from the emulated space.
    ///
    /// Returns the physical address of the block, or None if there's not enough space.
    pub fn allocate(&mut self, size: u64, align: u64) -> Option<PhysicalAddress> {
        let aligned = (self.base + self.next_alloc).next_multiple_of(align) - self.base;
        let end = aligned.checked_add(size)?;
        if end > self.memory.len() as u64 {
            return None;
        }
        self.next_alloc = end;
        Some(PhysicalAddress::new(self.base + aligned))
    }

    /// Allocates a zeroed table of `bytes` bytes, aligned to its own size.
    ///
    /// Tables smaller than 64 bytes are still 64-byte aligned, like the hardware requires.
    pub fn allocate_table(&mut self, bytes: u64) -> Option<PhysicalAddress> {
        self.allocate(bytes, bytes.next_power_of_two().max(64))
    }

    /// Stores a little-endian 64-bit value. Panics if `address` is outside the buffer.
    pub fn write_u64(&mut self, address: PhysicalAddress, value: u64) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    /// Stores raw bytes. Panics if the range is outside the buffer.
    pub fn write_bytes(&mut self, address: PhysicalAddress, bytes: &[u8]) {
        let offset = self
            .offset(address, bytes.len())
            .expect("write outside emulated memory");
        self.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Sets entry `index` of the table at `table`.
    pub fn set_entry(&mut self, table: PhysicalAddress, index: u64, value: u64) {
        self.write_u64(table + index * ENTRY_SIZE, value);
    }

    fn offset(&self, address: PhysicalAddress, length: usize) -> Option<usize> {
        let offset = usize::try_from(address.as_u64().checked_sub(self.base)?).ok()?;
        let end = offset.checked_add(length)?;
        (end <= self.memory.len()).then_some(offset)
    }
}

impl MemoryReader for EmulatedMemory {
    fn read(&self, address: DumpAddress, buf: &mut [u8]) -> Result<(), ReadError> {
        let not_captured = ReadError::NotCaptured {
            address,
            length: buf.len(),
        };
        let DumpAddress::Physical(physical) = address else {
            return Err(not_captured);
        };
        let offset = self.offset(physical, buf.len()).ok_or(not_captured)?;
        buf.copy_from_slice(&self.memory[offset..offset + buf.len()]);
        Ok(())
    }
}

/// Hand-recorded dump metadata.
#[derive(Debug, Clone, Default)]
pub struct RecordedMetadata {
    symbols: HashMap<String, u64>,
    numbers: HashMap<String, u64>,
    sizes: HashMap<String, u64>,
    segments: Vec<LoadSegment>,
}

impl RecordedMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, name: &str, value: u64) -> Self {
        self.symbols.insert(name.to_owned(), value);
        self
    }

    pub fn with_number(mut self, name: &str, value: u64) -> Self {
        self.numbers.insert(name.to_owned(), value);
        self
    }

    pub fn with_structure_size(mut self, name: &str, size: u64) -> Self {
        self.sizes.insert(name.to_owned(), size);
        self
    }

    pub fn with_segment(mut self, segment: LoadSegment) -> Self {
        self.segments.push(segment);
        self
    }
}

impl DumpMetadata for RecordedMetadata {
    fn symbol(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    fn number(&self, name: &str) -> Option<u64> {
        self.numbers.get(name).copied()
    }

    fn structure_size(&self, name: &str) -> Option<u64> {
        self.sizes.get(name).copied()
    }

    fn load_segments(&self) -> &[LoadSegment] {
        &self.segments
    }
}
