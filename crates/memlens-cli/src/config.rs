//! `memlens.toml` configuration.
//!
//! ```toml
//! process = "PathOfExile.exe"
//! patterns_file = "patterns.json"
//! poll_interval_ms = 50
//! window_scale = 1.25
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memlens_core::{
    EngineConfig, PatternSet, ProcessSelector, SchemaRegistry, builtin_schemas, load_schemas,
};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Pid or executable name
    pub process: Option<String>,
    pub module: Option<String>,
    pub patterns_file: Option<PathBuf>,
    pub schemas_file: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub window_scale: f64,
    pub scan_chunk_size: Option<usize>,
    pub max_read_size: Option<usize>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            process: None,
            module: None,
            patterns_file: None,
            schemas_file: None,
            poll_interval_ms: 100,
            window_scale: 1.0,
            scan_chunk_size: None,
            max_read_size: None,
        }
    }
}

impl CliConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.as_ref().display()))?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn selector(&self) -> Result<ProcessSelector> {
        let process = self
            .process
            .as_deref()
            .context("No target process; pass --process or set `process` in memlens.toml")?;
        Ok(process.parse()?)
    }

    /// Engine configuration with the configured pattern table
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut builder = EngineConfig::builder();
        if let Ok(selector) = self.selector() {
            builder = builder.process(selector);
        }
        if let Some(module) = &self.module {
            builder = builder.module(module.as_str());
        }
        if let Some(size) = self.scan_chunk_size {
            builder = builder.scan_chunk_size(size);
        }
        if let Some(size) = self.max_read_size {
            builder = builder.max_read_size(size);
        }
        if let Some(path) = &self.patterns_file {
            builder = builder
                .patterns_file(path)
                .with_context(|| format!("cannot load patterns from {}", path.display()))?;
        }
        if let Some(path) = &self.schemas_file {
            builder = builder
                .schemas_file(path)
                .with_context(|| format!("cannot load schemas from {}", path.display()))?;
        }
        Ok(builder.build())
    }

    /// Engine configuration without root patterns, for raw reads and ad-hoc scans
    pub fn bare_engine_config(&self) -> Result<EngineConfig> {
        let mut config = self.engine_config()?;
        config.patterns = PatternSet {
            version: "none".to_string(),
            entries: Vec::new(),
        };
        Ok(config)
    }

    pub fn schema_registry(&self) -> Result<SchemaRegistry> {
        let set = match &self.schemas_file {
            Some(path) => load_schemas(path)
                .with_context(|| format!("cannot load schemas from {}", path.display()))?,
            None => builtin_schemas(),
        };
        Ok(SchemaRegistry::new(set)?)
    }
}
