use std::path::PathBuf;

/// Errors raised while opening a dump and its companion files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid ELF file: {0}")]
    Elf(#[from] elf::ParseError),
    #[error("invalid DWARF debug info: {0}")]
    Dwarf(#[from] gimli::Error),
    #[error(transparent)]
    Config(#[from] kvtop::ConfigError),
    #[error("not an ELF core dump (e_type {0:#x})")]
    NotCore(u16),
    #[error("unsupported machine type {0}")]
    UnsupportedMachine(u16),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io { path, source }
    }
}
