//! Hexdump command.
//!
//! ```text
//! 0x000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use anyhow::{Context, Result};
use memlens_core::MemoryDump;

use super::hex_utils::format_address;
use crate::config::CliConfig;

pub fn run(config: &CliConfig, address: u64, size: usize, ascii: bool) -> Result<()> {
    let (engine, _) = super::attach(config.bare_engine_config()?, &config.selector()?)?;
    let reader = engine.reader().context("engine detached")?;
    let dump = MemoryDump::read(reader, address, size)?;

    println!("Hexdump at {} ({} bytes):", format_address(address), size);
    println!();
    for line in dump.lines(ascii) {
        println!("{}", line);
    }

    Ok(())
}
