//! Error types for configuration resolution, raw reads and translation.

use crate::{DumpAddress, Level, PhysicalAddress, VirtualAddress};

/// The platform configuration could not be derived from the dump.
///
/// Every variant is fatal: without a configuration no translation is possible at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "kernel configuration not supported: {page_size} byte pages with {va_bits} VA bits"
    )]
    Unsupported { page_size: u64, va_bits: u32 },
    #[error(
        "cannot determine phys_base: no recorded physical offset and no loadable segments"
    )]
    Unresolved,
    #[error("invalid table geometry: {0}")]
    InvalidGeometry(&'static str),
}

/// A raw read from the dump failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("{address} is not captured in the dump")]
    NotCaptured { address: DumpAddress, length: usize },
    #[error("read of {length} bytes at {address} runs past the captured range")]
    Truncated { address: DumpAddress, length: usize },
}

/// A single translation failed.
///
/// None of these abort processing; [`crate::Translator::translate`] folds them into `None`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("can't get the symbol of {0}")]
    SymbolMissing(&'static str),
    #[error("can't read {level} entry at {entry_address}")]
    ReadFailure {
        level: Level,
        entry_address: PhysicalAddress,
        #[source]
        source: ReadError,
    },
    #[error("{level} entry for {address} is not present")]
    PageNotPresent { level: Level, address: VirtualAddress },
    #[error("{level} entry {entry:#018x} for {address} is invalid")]
    InvalidEntry {
        level: Level,
        entry: u64,
        address: VirtualAddress,
    },
    /// The address translated, but the memory behind it is not in the dump.
    #[error("can't read memory at {address}")]
    DataRead {
        address: VirtualAddress,
        #[source]
        source: ReadError,
    },
}
