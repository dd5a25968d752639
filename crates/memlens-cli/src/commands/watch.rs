//! Watch command: track one structure and print it whenever it changes.

use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use memlens_core::{Engine, Error, IdentitySlot, ObjectHandle, SnapshotView, WINDOW_SCALE};
use tracing::{debug, info, warn};

use super::hex_utils::format_address;
use crate::config::CliConfig;
use crate::shutdown::ShutdownSignal;

/// Relocation is checked every this many ticks
const RELOCATION_CHECK_TICKS: u64 = 50;

pub enum Target {
    Address(u64),
    /// Root pattern name, resolved after attach
    Anchor(String),
}

pub fn run(config: &CliConfig, schema: &str, target: Target, json: bool) -> Result<()> {
    let shutdown = ShutdownSignal::on_ctrlc()?;
    let engine_config = match target {
        Target::Address(_) => config.bare_engine_config()?,
        Target::Anchor(_) => config.engine_config()?,
    };
    let (mut engine, _) = super::attach(engine_config, &config.selector()?)?;
    engine.set_parameter(WINDOW_SCALE, config.window_scale);

    let slot = IdentitySlot::from_name(schema);
    let mut handle = track(&mut engine, &target, schema, slot)?;
    let interval = Duration::from_millis(config.poll_interval_ms.max(1));
    let mut last_printed = String::new();

    println!("Watching {} (Ctrl+C to stop)", schema);
    while !shutdown.is_shutdown() {
        let report = match engine.tick() {
            Ok(report) => report,
            Err(Error::ProcessExited) => {
                println!("{}", "Target process exited".yellow());
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if report.tick % RELOCATION_CHECK_TICKS == 0 {
            match relocation_step(engine.check_relocation()) {
                RelocationStep::Unchanged => {}
                RelocationStep::Moved => {
                    warn!("Module relocated, tracking again");
                    handle = track(&mut engine, &target, schema, slot)?;
                    last_printed.clear();
                }
                RelocationStep::Stop => {
                    println!("{}", "Target process exited".yellow());
                    break;
                }
            }
        }

        let rendered = render(&engine.snapshot(handle)?, json)?;
        if rendered != last_printed {
            println!("{}", rendered);
            last_printed = rendered;
        }

        if shutdown.wait(interval) {
            break;
        }
    }

    engine.detach();
    info!("Watch stopped");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum RelocationStep {
    Unchanged,
    Moved,
    Stop,
}

/// Only a lost process ends the loop; anything else is retried next check
fn relocation_step(result: memlens_core::Result<bool>) -> RelocationStep {
    match result {
        Ok(true) => RelocationStep::Moved,
        Ok(false) => RelocationStep::Unchanged,
        Err(Error::ProcessExited | Error::NotAttached | Error::Detached) => RelocationStep::Stop,
        Err(e) => {
            warn!("Relocation check failed: {}", e);
            RelocationStep::Unchanged
        }
    }
}

fn track(
    engine: &mut Engine,
    target: &Target,
    schema: &str,
    slot: IdentitySlot,
) -> Result<ObjectHandle> {
    let address = match target {
        Target::Address(address) => *address,
        Target::Anchor(name) => engine.resolve_anchor(name)?,
    };
    debug!("Tracking {} at {}", schema, format_address(address));
    Ok(engine.track(address, schema, slot)?)
}

fn render(view: &SnapshotView, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string(view)?);
    }

    let text = match view {
        SnapshotView::Valid(snapshot) => format!(
            "{} gen {}\n{}",
            "[valid]".green(),
            snapshot.generation,
            snapshot.describe()
        ),
        SnapshotView::Stale { last, failure } => {
            let mut text = format!("{} {}", "[stale]".yellow(), failure.message);
            if let Some(last) = last {
                text.push('\n');
                text.push_str(&last.describe());
            }
            text
        }
        SnapshotView::Uninitialized => "[uninitialized]".bright_black().to_string(),
        SnapshotView::Cleared => "[cleared]".red().to_string(),
    };
    Ok(text)
}
