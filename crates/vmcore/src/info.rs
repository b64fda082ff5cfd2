//! Parser for the VMCOREINFO note.
//!
//! The kernel records what dump tools need to know about it as `KEY=VALUE` lines:
//!
//! ```text
//! OSRELEASE=6.1.0
//! PAGESIZE=4096
//! SYMBOL(swapper_pg_dir)=ffffffc0094e2000
//! SIZE(page)=64
//! OFFSET(page.flags)=0
//! LENGTH(mem_section)=1024
//! NUMBER(VA_BITS)=48
//! NUMBER(kimage_voffset)=0xffffffbf70000000
//! ```
//!
//! Symbols are hex without a prefix. Numbers may be decimal, negative decimal, or
//! `0x`-prefixed hex. `OFFSET` and `LENGTH` entries are kept as raw values under their
//! full key.

use std::{collections::HashMap, fs, path::Path};

use crate::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmcoreInfo {
    symbols: HashMap<String, u64>,
    numbers: HashMap<String, u64>,
    sizes: HashMap<String, u64>,
    values: HashMap<String, String>,
}

impl VmcoreInfo {
    /// Loads a standalone VMCOREINFO file, as saved by `makedumpfile -g`.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(Error::io(path))?;
        Ok(Self::parse(&text))
    }

    /// Parses VMCOREINFO text. Malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut info = Self::default();

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let Some((key, value)) = line.split_once('=') else {
                log::debug!("vmcoreinfo: ignoring line without '=': {line}");
                continue;
            };

            if let Some((kind, name)) = split_keyed(key) {
                let (table, parsed) = match kind {
                    "SYMBOL" => (&mut info.symbols, parse_hex(value)),
                    "NUMBER" => (&mut info.numbers, parse_number(value)),
                    "SIZE" => (&mut info.sizes, value.parse().ok()),
                    _ => {
                        info.values.insert(key.to_owned(), value.to_owned());
                        continue;
                    }
                };
                match parsed {
                    Some(parsed) => {
                        table.insert(name.to_owned(), parsed);
                    }
                    None => log::debug!("vmcoreinfo: bad value in {line}"),
                }
            } else {
                info.values.insert(key.to_owned(), value.to_owned());
            }
        }

        info
    }

    pub fn symbol(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    /// Returns `NUMBER(name)`, or a bare numeric key such as `PAGESIZE`.
    pub fn number(&self, name: &str) -> Option<u64> {
        self.numbers
            .get(name)
            .copied()
            .or_else(|| self.value(name).and_then(parse_number))
    }

    pub fn size(&self, name: &str) -> Option<u64> {
        self.sizes.get(name).copied()
    }

    /// Returns the raw text of a bare or unrecognized key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn osrelease(&self) -> Option<&str> {
        self.value("OSRELEASE")
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
            && self.numbers.is_empty()
            && self.sizes.is_empty()
            && self.values.is_empty()
    }
}

/// Splits `KIND(name)` into its parts.
fn split_keyed(key: &str) -> Option<(&str, &str)> {
    let (kind, rest) = key.split_once('(')?;
    let name = rest.strip_suffix(')')?;
    Some((kind, name))
}

fn strip_hex_prefix(value: &str) -> Option<&str> {
    value.strip_prefix("0x").or(value.strip_prefix("0X"))
}

fn parse_hex(value: &str) -> Option<u64> {
    let digits = strip_hex_prefix(value).unwrap_or(value);
    u64::from_str_radix(digits, 16).ok()
}

fn parse_number(value: &str) -> Option<u64> {
    if let Some(hex) = strip_hex_prefix(value) {
        u64::from_str_radix(hex, 16).ok()
    } else if value.starts_with('-') {
        value.parse::<i64>().ok().map(|signed| signed as u64)
    } else {
        value.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARM64: &str = "\
OSRELEASE=6.1.0-rc3
PAGESIZE=4096
SYMBOL(swapper_pg_dir)=ffffffc0094e2000
SYMBOL(_stext)=ffffffc008010000
SIZE(page)=64
OFFSET(page.flags)=0
LENGTH(mem_section)=1024
NUMBER(VA_BITS)=48
NUMBER(kimage_voffset)=0xffffffbf70000000
NUMBER(PHYS_OFFSET)=0x40000000
NUMBER(KERNEL_IMAGE_SIZE)=-1
";

    #[test]
    fn parses_every_kind_of_key() {
        let info = VmcoreInfo::parse(ARM64);
        assert_eq!(info.osrelease(), Some("6.1.0-rc3"));
        assert_eq!(info.symbol("swapper_pg_dir"), Some(0xffff_ffc0_094e_2000));
        assert_eq!(info.size("page"), Some(64));
        assert_eq!(info.value("OFFSET(page.flags)"), Some("0"));
        assert_eq!(info.value("LENGTH(mem_section)"), Some("1024"));
        assert_eq!(info.number("VA_BITS"), Some(48));
        assert_eq!(info.number("kimage_voffset"), Some(0xffff_ffbf_7000_0000));
        assert_eq!(info.number("PHYS_OFFSET"), Some(0x4000_0000));
    }

    #[test]
    fn negative_numbers_wrap() {
        let info = VmcoreInfo::parse(ARM64);
        assert_eq!(info.number("KERNEL_IMAGE_SIZE"), Some(u64::MAX));
    }

    #[test]
    fn bare_keys_are_numbers_too() {
        let info = VmcoreInfo::parse(ARM64);
        assert_eq!(info.number("PAGESIZE"), Some(4096));
        assert_eq!(info.number("OSRELEASE"), None);
    }

    #[test]
    fn skips_malformed_lines() {
        let info = VmcoreInfo::parse("garbage\nSYMBOL(x)=zz\nSYMBOL(y)=10\nSIZE(bad\n\n");
        assert_eq!(info.symbol("x"), None);
        assert_eq!(info.symbol("y"), Some(0x10));
        assert_eq!(info.value("SIZE(bad"), None);
    }

    #[test]
    fn empty_text() {
        assert!(VmcoreInfo::parse("").is_empty());
        assert!(!VmcoreInfo::parse("PAGESIZE=4096").is_empty());
    }
}
