//! Root discovery report.

use anyhow::Result;
use owo_colors::OwoColorize;

use super::hex_utils::format_address;
use crate::config::CliConfig;

pub fn run(config: &CliConfig, json: bool) -> Result<()> {
    let (engine, info) = super::attach(config.engine_config()?, &config.selector()?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!(
        "pid {}  module {} @ {}  patterns {}",
        info.pid,
        info.module.name.as_deref().unwrap_or("?"),
        format_address(info.module.base),
        info.patterns_version
    );
    for anchor in &info.anchors {
        let resolved = match engine.resolve_anchor(&anchor.name) {
            Ok(address) => format_address(address).green().to_string(),
            Err(e) => format!("{}", e).red().to_string(),
        };
        println!(
            "  {:<20} anchor {}  -> {}",
            anchor.name,
            format_address(anchor.address),
            resolved
        );
    }

    Ok(())
}
