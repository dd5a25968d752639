//! Ad-hoc pattern scan over the target module.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use memlens_core::MemoryPattern;

use super::hex_utils::format_address;
use crate::config::CliConfig;

pub fn run(config: &CliConfig, pattern: &str, all: bool) -> Result<()> {
    let pattern: MemoryPattern = pattern.parse()?;
    let (engine, info) = super::attach(config.bare_engine_config()?, &config.selector()?)?;

    println!(
        "Scanning {} {}..{} for {}",
        info.module.name.as_deref().unwrap_or("module"),
        format_address(info.module.base),
        format_address(info.module.end()),
        pattern
    );

    let hits = engine.scan(&pattern).context("scan failed")?;
    if hits.is_empty() {
        println!("{}", "No match".red());
        return Ok(());
    }

    let shown = if all { hits.len() } else { 1 };
    for address in &hits[..shown] {
        println!(
            "  {}  (module+{})",
            format_address(*address).green(),
            format_address(address - info.module.base)
        );
    }
    if !all && hits.len() > 1 {
        println!("{} more match(es); use --all to list them", hits.len() - 1);
    }

    Ok(())
}
