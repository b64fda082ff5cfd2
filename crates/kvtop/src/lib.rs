#![cfg_attr(not(any(test, feature = "software-emulation")), no_std)]

//! # kvtop
//!
//! Kernel virtual-to-physical address translation for crash dumps.
//!
//! A crash dump only stores physical memory. Before anything inside it can be read by
//! kernel virtual address, the address has to be translated the same way the MMU of the
//! crashed machine would have done it. This crate provides:
//!
//! - Platform configuration inference (page size, VA width, table depth, physical base)
//!   from the sparse metadata recorded in the dump.
//! - Page-table geometry derived from that configuration.
//! - A generic N-level page-table walker driven by the geometry.
//! - An address translator that picks between linear-map arithmetic and a table walk.
//!
//! The dump itself is reached through the [`DumpMetadata`] and [`MemoryReader`]
//! collaborator traits, so the crate has no opinion on the container format.

mod address;
pub mod arch;
mod config;
mod entry;
mod error;
mod geometry;
mod human_size;
mod source;
mod translator;
mod walker;

#[cfg(any(test, feature = "software-emulation"))]
mod emulated;

pub use address::{DumpAddress, PhysicalAddress, VirtualAddress};
pub use arch::{Arch, ArchProfile, EntryKind, arm64::Arm64, x86_64::X86_64};
pub use config::{KernelLayout, PageConfig, PlatformConfig, Region, TableDepth};
pub use entry::TableEntry;
pub use error::{ConfigError, ReadError, TranslateError};
pub use geometry::{ENTRY_SIZE, Geometry, Level, LevelGeometry, LevelMode};
pub use human_size::HumanSize;
pub use source::{DumpMetadata, LoadSegment, MemoryReader};
pub use translator::Translator;
pub use walker::{Translation, Walker};

#[cfg(any(test, feature = "software-emulation"))]
pub use emulated::{EmulatedMemory, RecordedMetadata};
