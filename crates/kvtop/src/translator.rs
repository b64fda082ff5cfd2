//! The address translation entry point.

use crate::{
    ConfigError, DumpAddress, DumpMetadata, Geometry, MemoryReader, PhysicalAddress, PlatformConfig,
    TranslateError, Translation, VirtualAddress, Walker,
};

/// Translates kernel virtual addresses of a crashed kernel into dump physical addresses.
///
/// Addresses in the vmalloc, vmemmap and module regions are mapped page by page, so they
/// go through the page tables. Everything else is assumed to be in the linear map and
/// is translated arithmetically:
///
/// ```text
/// physical = virtual - page_offset + phys_base
/// ```
///
/// Addresses outside the linear map fall back to the kernel image offset when the dump
/// records one.
pub struct Translator<'a, R: MemoryReader + ?Sized> {
    config: &'a PlatformConfig,
    geometry: Geometry,
    reader: &'a R,
    root: Option<PhysicalAddress>,
    forced_walk: Option<VirtualAddress>,
}

impl<'a, R: MemoryReader + ?Sized> Translator<'a, R> {
    /// Creates a translator for a resolved configuration.
    ///
    /// The root table is located through the profile's root symbol. If the symbol is
    /// missing this is reported once here; linear translations keep working and walks
    /// fail with [`TranslateError::SymbolMissing`].
    pub fn new(
        config: &'a PlatformConfig,
        meta: &dyn DumpMetadata,
        reader: &'a R,
    ) -> Result<Self, ConfigError> {
        let geometry = config.geometry()?;

        let mut translator = Self {
            config,
            geometry,
            reader,
            root: None,
            forced_walk: None,
        };

        let symbol = config.profile().root_table_symbol();
        match meta.symbol(symbol) {
            Some(value) => {
                let root = translator.direct(VirtualAddress::new(value));
                log::debug!("{symbol}: {value:#x} (root table at {root})");
                translator.root = Some(root);
            }
            None => log::warn!("can't get the symbol of {symbol}, table walks disabled"),
        }

        Ok(translator)
    }

    /// Always walks the tables for `address`, wherever it lies.
    pub fn with_forced_walk(mut self, address: VirtualAddress) -> Self {
        self.forced_walk = Some(address);
        self
    }

    pub fn config(&self) -> &PlatformConfig {
        self.config
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Physical address of the root table, if its symbol was found.
    pub fn root(&self) -> Option<PhysicalAddress> {
        self.root
    }

    /// Translates `address`, or returns `None` if it isn't mapped or can't be read.
    pub fn translate(&self, address: VirtualAddress) -> Option<PhysicalAddress> {
        self.try_translate(address)
            .inspect_err(|err| log::debug!("vtop of {address} failed: {err}"))
            .ok()
    }

    /// Translates `address`, reporting why it failed.
    pub fn try_translate(
        &self,
        address: VirtualAddress,
    ) -> Result<PhysicalAddress, TranslateError> {
        if self.needs_walk(address) {
            self.walk(address).map(|translation| translation.physical)
        } else {
            Ok(self.direct(address))
        }
    }

    /// Returns true if `address` is translated through the tables.
    pub fn needs_walk(&self, address: VirtualAddress) -> bool {
        self.forced_walk == Some(address) || self.config.layout().needs_table_walk(address)
    }

    /// Walks the page tables for `address`, regardless of its region.
    pub fn walk(&self, address: VirtualAddress) -> Result<Translation, TranslateError> {
        let symbol = self.config.profile().root_table_symbol();
        let root = self.root.ok_or(TranslateError::SymbolMissing(symbol))?;
        Walker::new(self.config.profile(), &self.geometry, self.reader, root).walk(address)
    }

    /// Translates `address` arithmetically, without looking at any table.
    pub fn direct(&self, address: VirtualAddress) -> PhysicalAddress {
        let layout = self.config.layout();
        let virt = address.as_u64();

        let phys = match self.config.image_voffset() {
            Some(voffset) if !layout.is_linear(address) => virt.wrapping_sub(voffset),
            _ => virt
                .wrapping_sub(layout.page_offset)
                .wrapping_add(self.config.phys_base()),
        };
        PhysicalAddress::new(phys)
    }

    /// Fills `buf` with the bytes at virtual `address`, translating page by page.
    pub fn read_virtual(
        &self,
        address: VirtualAddress,
        buf: &mut [u8],
    ) -> Result<(), TranslateError> {
        let page_size = self.config.page_size();
        let mut done = 0;

        while done < buf.len() {
            let current = address + done as u64;
            let in_page = (page_size - current.offset_within(page_size)) as usize;
            let chunk = in_page.min(buf.len() - done);

            let physical = self.try_translate(current)?;
            let target = &mut buf[done..done + chunk];
            self.reader
                .read(DumpAddress::Physical(physical), target)
                .map_err(|source| TranslateError::DataRead {
                    address: current,
                    source,
                })?;
            done += chunk;
        }

        Ok(())
    }
}
