//! Builds small ELF64 little-endian core files for tests.

use elf::abi;

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

struct Segment {
    physical: u64,
    virtual_start: u64,
    data: Vec<u8>,
    memory_size: u64,
}

pub struct CoreBuilder {
    machine: u16,
    notes: Vec<u8>,
    segments: Vec<Segment>,
}

impl CoreBuilder {
    pub fn new(machine: u16) -> Self {
        Self {
            machine,
            notes: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn with_note(mut self, name: &[u8], desc: &[u8]) -> Self {
        push32(&mut self.notes, (name.len() + 1) as u32);
        push32(&mut self.notes, desc.len() as u32);
        push32(&mut self.notes, 0);
        self.notes.extend_from_slice(name);
        self.notes.push(0);
        self.pad_notes();
        self.notes.extend_from_slice(desc);
        self.pad_notes();
        self
    }

    pub fn with_vmcoreinfo(self, text: &str) -> Self {
        self.with_note(b"VMCOREINFO", text.as_bytes())
    }

    /// Adds a `PT_LOAD` segment holding `data`, covering `memory_size` bytes of RAM.
    pub fn with_segment(
        mut self,
        physical: u64,
        virtual_start: u64,
        data: Vec<u8>,
        memory_size: u64,
    ) -> Self {
        self.segments.push(Segment {
            physical,
            virtual_start,
            data,
            memory_size,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let has_notes = !self.notes.is_empty();
        let phnum = self.segments.len() + usize::from(has_notes);
        let mut offset = (EHDR_SIZE + phnum * PHDR_SIZE) as u64;

        let mut out = Vec::new();
        out.extend_from_slice(&[0x7F, b'E', b'L', b'F']);
        out.push(abi::ELFCLASS64);
        out.push(abi::ELFDATA2LSB);
        out.push(abi::EV_CURRENT);
        out.resize(16, 0);
        push16(&mut out, abi::ET_CORE);
        push16(&mut out, self.machine);
        push32(&mut out, 1);
        push64(&mut out, 0); // e_entry
        push64(&mut out, EHDR_SIZE as u64); // e_phoff
        push64(&mut out, 0); // e_shoff
        push32(&mut out, 0); // e_flags
        push16(&mut out, EHDR_SIZE as u16);
        push16(&mut out, PHDR_SIZE as u16);
        push16(&mut out, phnum as u16);
        push16(&mut out, 64); // e_shentsize
        push16(&mut out, 0); // e_shnum
        push16(&mut out, 0); // e_shstrndx

        let phdr = |out: &mut Vec<u8>, p_type, vaddr, paddr, filesz, memsz, offset| {
            push32(out, p_type);
            push32(out, 0);
            push64(out, offset);
            push64(out, vaddr);
            push64(out, paddr);
            push64(out, filesz);
            push64(out, memsz);
            push64(out, 0);
        };

        if has_notes {
            let size = self.notes.len() as u64;
            phdr(&mut out, abi::PT_NOTE, 0, 0, size, 0, offset);
            offset += size;
        }
        for segment in &self.segments {
            let size = segment.data.len() as u64;
            phdr(
                &mut out,
                abi::PT_LOAD,
                segment.virtual_start,
                segment.physical,
                size,
                segment.memory_size,
                offset,
            );
            offset += size;
        }

        out.extend_from_slice(&self.notes);
        for segment in &self.segments {
            out.extend_from_slice(&segment.data);
        }
        out
    }

    fn pad_notes(&mut self) {
        self.notes.resize(self.notes.len().next_multiple_of(4), 0);
    }
}

fn push16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}
