//! Engine configuration.
//!
//! ```ignore
//! use memlens_core::{EngineConfig, ProcessSelector};
//!
//! let config = EngineConfig::builder()
//!     .process(ProcessSelector::Name("PathOfExile.exe".into()))
//!     .scan_chunk_size(128 * 1024)
//!     .build();
//! ```

use std::path::Path;

use crate::error::Result;
use crate::memory::{DEFAULT_MAX_READ_SIZE, ProcessSelector};
use crate::offset::{DEFAULT_SCAN_CHUNK_SIZE, PatternSet, builtin_patterns, load_patterns};
use crate::schema::{SchemaSet, builtin_schemas, load_schemas};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Process used by `Engine::attach_configured`
    pub process: Option<ProcessSelector>,
    /// Module that root discovery scans; `None` means the main executable
    pub module: Option<String>,
    pub scan_chunk_size: usize,
    pub max_read_size: usize,
    pub patterns: PatternSet,
    pub schemas: SchemaSet,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            process: None,
            module: None,
            scan_chunk_size: DEFAULT_SCAN_CHUNK_SIZE,
            max_read_size: DEFAULT_MAX_READ_SIZE,
            patterns: builtin_patterns(),
            schemas: builtin_schemas(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for EngineConfig
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    process: Option<ProcessSelector>,
    module: Option<String>,
    scan_chunk_size: Option<usize>,
    max_read_size: Option<usize>,
    patterns: Option<PatternSet>,
    schemas: Option<SchemaSet>,
}

impl EngineConfigBuilder {
    pub fn process(mut self, selector: ProcessSelector) -> Self {
        self.process = Some(selector);
        self
    }

    /// Scan this module instead of the main executable
    pub fn module<S: Into<String>>(mut self, name: S) -> Self {
        self.module = Some(name.into());
        self
    }

    pub fn scan_chunk_size(mut self, size: usize) -> Self {
        self.scan_chunk_size = Some(size);
        self
    }

    pub fn max_read_size(mut self, size: usize) -> Self {
        self.max_read_size = Some(size);
        self
    }

    pub fn patterns(mut self, patterns: PatternSet) -> Self {
        self.patterns = Some(patterns);
        self
    }

    pub fn schemas(mut self, schemas: SchemaSet) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Load the pattern table from a JSON file
    pub fn patterns_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        Ok(self.patterns(load_patterns(path)?))
    }

    /// Load the schema table from a JSON file
    pub fn schemas_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        Ok(self.schemas(load_schemas(path)?))
    }

    pub fn build(self) -> EngineConfig {
        let default = EngineConfig::default();
        EngineConfig {
            process: self.process.or(default.process),
            module: self.module.or(default.module),
            scan_chunk_size: self.scan_chunk_size.unwrap_or(default.scan_chunk_size),
            max_read_size: self.max_read_size.unwrap_or(default.max_read_size),
            patterns: self.patterns.unwrap_or(default.patterns),
            schemas: self.schemas.unwrap_or(default.schemas),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::{BUILTIN_PATTERNS_VERSION, PatternEntry, save_patterns};
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.process.is_none());
        assert!(config.module.is_none());
        assert_eq!(config.scan_chunk_size, DEFAULT_SCAN_CHUNK_SIZE);
        assert_eq!(config.max_read_size, DEFAULT_MAX_READ_SIZE);
        assert_eq!(config.patterns.version, BUILTIN_PATTERNS_VERSION);
        assert!(!config.schemas.schemas.is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::builder()
            .process(ProcessSelector::Pid(99))
            .module("client.dll")
            .scan_chunk_size(4096)
            .max_read_size(1 << 20)
            .build();
        assert_eq!(config.process, Some(ProcessSelector::Pid(99)));
        assert_eq!(config.module.as_deref(), Some("client.dll"));
        assert_eq!(config.scan_chunk_size, 4096);
        assert_eq!(config.max_read_size, 1 << 20);
    }

    #[test]
    fn test_builder_patterns_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        let set = PatternSet {
            version: "test-3".to_string(),
            entries: vec![PatternEntry::new("Root", "48 8B 05 ^ ?? ?? ?? ??").unwrap()],
        };
        save_patterns(&path, &set).unwrap();

        let config = EngineConfig::builder().patterns_file(&path).unwrap().build();
        assert_eq!(config.patterns, set);

        assert!(
            EngineConfig::builder()
                .patterns_file(dir.path().join("missing.json"))
                .is_err()
        );
    }
}
