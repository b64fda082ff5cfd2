use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kvtop::{Arch, HumanSize, MemoryReader, Translator, VirtualAddress};
use vmcore::{Console, Session, SessionOptions};

#[derive(Parser)]
#[command(name = "vmcore")]
#[command(about = "Kernel crash dump address translation tool")]
struct Args {
    #[command(flatten)]
    dump: DumpArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct DumpArgs {
    /// ELF core dump (e.g. a saved /proc/vmcore)
    #[arg(short, long)]
    dump: PathBuf,

    /// Kernel image with debug info, for symbols and structure sizes
    #[arg(long)]
    vmlinux: Option<PathBuf>,

    /// VMCOREINFO file to use instead of the note in the dump
    #[arg(long)]
    vmcoreinfo: Option<PathBuf>,

    /// Architecture of the crashed kernel (default: from the ELF header)
    #[arg(long, value_enum)]
    arch: Option<ArchArg>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum ArchArg {
    Arm64,
    #[value(name = "x86_64")]
    X86_64,
}

impl From<ArchArg> for Arch {
    fn from(value: ArchArg) -> Self {
        match value {
            ArchArg::Arm64 => Arch::Arm64,
            ArchArg::X86_64 => Arch::X86_64,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved platform configuration and kernel layout
    Info,
    /// Translate kernel virtual addresses to physical addresses
    Translate {
        /// Addresses to translate (hexadecimal with 0x prefix, or decimal)
        #[arg(required = true, value_parser = parse_address)]
        addresses: Vec<u64>,

        /// Walk the page tables even for linearly mapped addresses
        #[arg(long)]
        walk: bool,
    },
    /// Hex dump kernel virtual memory
    Read {
        /// Start address (hexadecimal with 0x prefix, or decimal)
        #[arg(short, long, value_parser = parse_address)]
        address: u64,

        /// Number of bytes to read
        #[arg(short, long, default_value_t = 64)]
        length: usize,
    },
}

fn parse_address(text: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = text.strip_prefix("0x") {
        u64::from_str_radix(&hex.replace('_', ""), 16)
    } else {
        text.parse::<u64>()
    }
}

fn info(session: &Session) {
    let config = session.config();
    let layout = config.layout();

    println!("arch             : {}", config.arch());
    if let Some(release) = session.metadata().vmcoreinfo().osrelease() {
        println!("release          : {release}");
    }
    println!("page size        : {}", HumanSize(config.page_size()));
    println!("va_bits          : {}", config.va_bits());
    println!("pgtable levels   : {}", config.table_depth().levels());
    println!("phys_base        : {:#x}", config.phys_base());
    if let Some(voffset) = config.image_voffset() {
        println!("image voffset    : {voffset:#x}");
    }
    println!("max_physmem_bits : {}", config.max_physical_bits());
    println!("page_offset      : {:#018x}", layout.page_offset);
    for (name, region) in [
        ("linear", layout.linear),
        ("vmalloc", layout.vmalloc),
        ("vmemmap", layout.vmemmap),
        ("modules", layout.modules),
    ] {
        println!("{name:<17}: {:#018x} - {:#018x}", region.start, region.end);
    }
    println!("segments         : {}", session.core().segments().len());
}

/// Formats the translation of one address, walking its tables at most once.
fn describe<R>(translator: &Translator<'_, R>, address: VirtualAddress, walk: bool) -> String
where
    R: MemoryReader + ?Sized,
{
    if !walk && !translator.needs_walk(address) {
        return format!("{address} -> {} (linear)", translator.direct(address));
    }
    match translator.walk(address) {
        Ok(t) => {
            let size = HumanSize(t.size);
            format!("{address} -> {} ({size} {})", t.physical, t.level)
        }
        Err(err) => format!("{address} -> not mapped: {err}"),
    }
}

fn translate(session: &Session, addresses: &[u64], walk: bool) -> Result<(), Box<dyn Error>> {
    let translator = session.translator()?;
    for &address in addresses {
        let line = describe(&translator, VirtualAddress::new(address), walk);
        println!("{line}");
    }
    Ok(())
}

fn read(session: &Session, address: u64, length: usize) -> Result<(), Box<dyn Error>> {
    let translator = session.translator()?;
    let mut buf = vec![0u8; length];
    translator.read_virtual(VirtualAddress::new(address), &mut buf)?;

    for (i, line) in buf.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|byte| format!("{byte:02x}")).collect();
        let ascii: String = line
            .iter()
            .map(|&byte| {
                if byte.is_ascii_graphic() || byte == b' ' {
                    byte as char
                } else {
                    '.'
                }
            })
            .collect();
        println!(
            "{:016x}: {:<47}  |{}|",
            address.wrapping_add((i * 16) as u64),
            hex.join(" "),
            ascii
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if let Err(err) = Console::init(Console::level_for_verbosity(args.dump.verbose)) {
        eprintln!("can't install logger: {err}");
    }

    let options = SessionOptions {
        vmlinux: args.dump.vmlinux,
        vmcoreinfo: args.dump.vmcoreinfo,
        arch: args.dump.arch.map(Arch::from),
    };
    let dump = &args.dump.dump;
    let session = Session::open(dump, &options).inspect_err(|err| log::error!("{err}"))?;

    match args.command {
        Command::Info => {
            info(&session);
            Ok(())
        }
        Command::Translate { addresses, walk } => translate(&session, &addresses, walk),
        Command::Read { address, length } => read(&session, address, length),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use kvtop::{DumpAddress, EmulatedMemory, PlatformConfig, ReadError, RecordedMetadata};

    const TABLE: u64 = 0b11;
    const PAGE: u64 = (1 << 54) | 0x703;

    /// Counts the reads that reach memory.
    struct CountingReader {
        memory: EmulatedMemory,
        reads: Cell<usize>,
    }

    impl MemoryReader for CountingReader {
        fn read(&self, address: DumpAddress, buf: &mut [u8]) -> Result<(), ReadError> {
            self.reads.set(self.reads.get() + 1);
            self.memory.read(address, buf)
        }
    }

    fn metadata() -> RecordedMetadata {
        RecordedMetadata::new()
            .with_number("PAGESIZE", 4096)
            .with_number("VA_BITS", 39)
            .with_number("PHYS_OFFSET", 0x4000_0000)
            .with_symbol("_stext", 0xFFFF_FFC0_0008_1000)
            .with_symbol("swapper_pg_dir", 0xFFFF_FFC0_0010_0000)
    }

    /// Three levels at 0x40100000 mapping the vmalloc page 0xffffff8000201000.
    fn reader() -> CountingReader {
        let mut memory = EmulatedMemory::new(0x4010_0000, 0x10_0000);
        let pgd = memory.allocate_table(0x1000).unwrap();
        let pmd = memory.allocate_table(0x1000).unwrap();
        let pte = memory.allocate_table(0x1000).unwrap();
        memory.set_entry(pgd, 0, pmd.as_u64() | TABLE);
        memory.set_entry(pmd, 1, pte.as_u64() | TABLE);
        memory.set_entry(pte, 1, 0x4015_5000 | PAGE);
        CountingReader {
            memory,
            reads: Cell::new(0),
        }
    }

    #[test]
    fn walked_address_reads_each_level_once() {
        let meta = metadata();
        let config = PlatformConfig::resolve(Arch::Arm64, &meta).unwrap();
        let reader = reader();
        let translator = Translator::new(&config, &meta, &reader).unwrap();
        let before = reader.reads.get();

        let address = VirtualAddress::new(0xFFFF_FF80_0020_1123);
        let line = describe(&translator, address, false);
        assert_eq!(line, "0xffffff8000201123 -> 0x40155123 (4KiB pte)");
        assert_eq!(reader.reads.get() - before, 3);
    }

    #[test]
    fn linear_address_reads_nothing() {
        let meta = metadata();
        let config = PlatformConfig::resolve(Arch::Arm64, &meta).unwrap();
        let reader = reader();
        let translator = Translator::new(&config, &meta, &reader).unwrap();
        let before = reader.reads.get();

        let address = VirtualAddress::new(0xFFFF_FFC0_0001_2345);
        let line = describe(&translator, address, false);
        assert_eq!(line, "0xffffffc000012345 -> 0x40012345 (linear)");
        assert_eq!(reader.reads.get(), before);
    }

    #[test]
    fn forced_walk_reports_the_missing_entry() {
        let meta = metadata();
        let config = PlatformConfig::resolve(Arch::Arm64, &meta).unwrap();
        let reader = reader();
        let translator = Translator::new(&config, &meta, &reader).unwrap();
        let before = reader.reads.get();

        let address = VirtualAddress::new(0xFFFF_FFC0_0001_2345);
        let line = describe(&translator, address, true);
        assert!(line.starts_with("0xffffffc000012345 -> not mapped: "));
        assert_eq!(reader.reads.get() - before, 1);
    }
}
