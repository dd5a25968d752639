//! CLI command implementations.

pub mod anchors;
pub mod hex_utils;
pub mod hexdump;
pub mod scan;
pub mod schemas;
pub mod watch;

use anyhow::{Context, Result};
use memlens_core::{AttachInfo, Engine, EngineConfig, ProcessSelector};
use tracing::info;

/// Build an engine from `config` and attach it to `selector`
pub(crate) fn attach(config: EngineConfig, selector: &ProcessSelector) -> Result<(Engine, AttachInfo)> {
    let mut engine: Engine = Engine::with_config(config)?;
    let info = engine
        .attach(selector)
        .with_context(|| format!("cannot attach to {}", selector))?;
    info!(
        "Attached to pid {} ({})",
        info.pid,
        info.module.name.as_deref().unwrap_or("unknown module")
    );
    Ok((engine, info))
}
