//! Schema registry listing.

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::config::CliConfig;

pub fn run(config: &CliConfig, json: bool) -> Result<()> {
    let registry = config.schema_registry()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&registry.to_set())?);
        return Ok(());
    }

    println!("Schemas version {} ({} total)", registry.version(), registry.len());
    for schema in registry.iter() {
        println!();
        println!("{} (0x{:X} bytes)", schema.name.as_str().bold(), schema.size);
        for field in &schema.fields {
            let marker = if schema.self_field.as_deref() == Some(field.name.as_str()) {
                " [self]"
            } else {
                ""
            };
            println!(
                "  +0x{:03X}  {:<20} {}{}",
                field.offset,
                field.name,
                field.kind.name(),
                marker
            );
        }
    }

    Ok(())
}
