//! # vmcore
//!
//! Reads Linux kernel crash dumps in ELF core format and hooks them up to [`kvtop`], so
//! kernel virtual addresses of the crashed machine can be translated and read.
//!
//! A [`Session`] bundles the dump, its VMCOREINFO, optional `vmlinux` debug info and the
//! resolved [`kvtop::PlatformConfig`].

mod console;
mod debuginfo;
mod dump;
mod error;
mod info;
mod metadata;
mod session;

#[cfg(test)]
mod testing;

pub use console::Console;
pub use debuginfo::DebugInfo;
pub use dump::Vmcore;
pub use error::Error;
pub use info::VmcoreInfo;
pub use metadata::Metadata;
pub use session::{Session, SessionOptions};
