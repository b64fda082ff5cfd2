//! Human-readable byte sizes for log output.

use core::fmt;

/// A size in bytes, displayed with the largest binary unit that divides it evenly.
///
/// Page and block sizes are always powers of two, so they print exactly: `4KiB`,
/// `64KiB`, `512MiB`, `1GiB`. Anything else falls back to plain bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct HumanSize(pub u64);

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

        let mut value = self.0;
        let mut unit = None;
        for name in UNITS {
            if value == 0 || value % 1024 != 0 {
                break;
            }
            value /= 1024;
            unit = Some(name);
        }

        match unit {
            Some(unit) => write!(f, "{value}{unit}"),
            None => write!(f, "{value}B"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_sizes() {
        assert_eq!(HumanSize(4096).to_string(), "4KiB");
        assert_eq!(HumanSize(16384).to_string(), "16KiB");
        assert_eq!(HumanSize(65536).to_string(), "64KiB");
    }

    #[test]
    fn block_sizes() {
        assert_eq!(HumanSize(2 << 20).to_string(), "2MiB");
        assert_eq!(HumanSize(512 << 20).to_string(), "512MiB");
        assert_eq!(HumanSize(1 << 30).to_string(), "1GiB");
        assert_eq!(HumanSize(64 << 40).to_string(), "64TiB");
    }

    #[test]
    fn uneven_sizes_stay_in_bytes_or_smaller_unit() {
        assert_eq!(HumanSize(0).to_string(), "0B");
        assert_eq!(HumanSize(1023).to_string(), "1023B");
        assert_eq!(HumanSize(1536).to_string(), "1536B");
        assert_eq!(HumanSize(3 << 10).to_string(), "3KiB");
        assert_eq!(HumanSize((1 << 20) + 1024).to_string(), "1025KiB");
    }
}
