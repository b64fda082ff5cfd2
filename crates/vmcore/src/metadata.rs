use kvtop::{DumpMetadata, LoadSegment};

use crate::{DebugInfo, VmcoreInfo};

/// Everything known about the crashed kernel, from the dump and its companion files.
///
/// VMCOREINFO describes the running kernel exactly, so its values win over the debug
/// info of the image.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    vmcoreinfo: VmcoreInfo,
    debug_info: Option<DebugInfo>,
    segments: Vec<LoadSegment>,
}

impl Metadata {
    pub fn new(
        vmcoreinfo: VmcoreInfo,
        debug_info: Option<DebugInfo>,
        segments: Vec<LoadSegment>,
    ) -> Self {
        Self {
            vmcoreinfo,
            debug_info,
            segments,
        }
    }

    pub fn vmcoreinfo(&self) -> &VmcoreInfo {
        &self.vmcoreinfo
    }

    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.debug_info.as_ref()
    }
}

impl DumpMetadata for Metadata {
    fn symbol(&self, name: &str) -> Option<u64> {
        self.vmcoreinfo
            .symbol(name)
            .or_else(|| self.debug_info.as_ref()?.symbol(name))
    }

    fn number(&self, name: &str) -> Option<u64> {
        self.vmcoreinfo.number(name)
    }

    fn structure_size(&self, name: &str) -> Option<u64> {
        self.vmcoreinfo
            .size(name)
            .or_else(|| self.debug_info.as_ref()?.structure_size(name))
    }

    fn load_segments(&self) -> &[LoadSegment] {
        &self.segments
    }
}
