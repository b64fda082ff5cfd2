//! Opening a dump together with its companion files.

use std::path::{Path, PathBuf};

use kvtop::{Arch, PlatformConfig, Translator};

use crate::{DebugInfo, Error, Metadata, Vmcore, VmcoreInfo};

/// Companion files and overrides for opening a dump.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Kernel image with debug info, for symbols and structure sizes.
    pub vmlinux: Option<PathBuf>,
    /// Standalone VMCOREINFO, used instead of the note in the dump.
    pub vmcoreinfo: Option<PathBuf>,
    /// Architecture override; otherwise taken from `e_machine`.
    pub arch: Option<Arch>,
}

/// An opened dump with its platform configuration resolved.
pub struct Session {
    core: Vmcore,
    metadata: Metadata,
    config: PlatformConfig,
}

impl Session {
    pub fn open(dump: &Path, options: &SessionOptions) -> Result<Self, Error> {
        let core = Vmcore::open(dump)?;
        let vmcoreinfo = match &options.vmcoreinfo {
            Some(path) => Some(VmcoreInfo::from_file(path)?),
            None => None,
        };
        let debug_info = match &options.vmlinux {
            Some(path) => Some(DebugInfo::open(path)?),
            None => None,
        };
        Self::from_parts(core, vmcoreinfo, debug_info, options.arch)
    }

    /// Resolves the configuration for an already loaded dump.
    ///
    /// An explicit `vmcoreinfo` replaces the note carried by the dump. Without either,
    /// the configuration comes from defaults, `_stext` and the debug info alone.
    pub fn from_parts(
        core: Vmcore,
        vmcoreinfo: Option<VmcoreInfo>,
        debug_info: Option<DebugInfo>,
        arch: Option<Arch>,
    ) -> Result<Self, Error> {
        let arch = match arch {
            Some(arch) => arch,
            None => core.arch()?,
        };

        let vmcoreinfo = vmcoreinfo
            .or_else(|| core.vmcoreinfo().map(VmcoreInfo::parse))
            .unwrap_or_default();
        if vmcoreinfo.is_empty() {
            log::warn!("no VMCOREINFO, relying on defaults and debug info");
        }
        if let Some(release) = vmcoreinfo.osrelease() {
            log::info!("kernel release {release}");
        }

        let metadata = Metadata::new(vmcoreinfo, debug_info, core.segments().to_vec());
        let config = PlatformConfig::resolve(arch, &metadata)?;

        Ok(Self {
            core,
            metadata,
            config,
        })
    }

    pub fn core(&self) -> &Vmcore {
        &self.core
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Creates a translator reading from the dump.
    pub fn translator(&self) -> Result<Translator<'_, Vmcore>, Error> {
        Ok(Translator::new(&self.config, &self.metadata, &self.core)?)
    }
}
