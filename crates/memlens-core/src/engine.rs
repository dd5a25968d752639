//! Engine facade.
//!
//! Ties the accessor, scanner, schema registry, and object cache together
//! behind the boundary operations consumers use:
//! - `attach` opens the process and runs root discovery over the pattern table
//! - `find_anchor` / `resolve_anchor` expose the discovered roots
//! - `track` / `follow` register objects, `tick` refreshes them
//! - `snapshot` / `snapshots` read the published state
//! - `check_relocation` and `detach` handle the attach boundary

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{
    IdentitySlot, ObjectHandle, RemoteObjectCache, SnapshotReader, SnapshotView, TickReport,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::memory::{MemoryReader, MemoryRegion, MemorySource, ProcessHandle, ProcessSelector};
use crate::node::Parameters;
use crate::offset::{MemoryPattern, PatternEntry, PatternSet, Scanner};
use crate::schema::SchemaRegistry;

/// Root anchor found during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAnchor {
    pub name: String,
    /// Scan hit adjusted to the pattern's anchor marker
    pub address: u64,
}

/// Result of a successful attach
#[derive(Debug, Clone, Serialize)]
pub struct AttachInfo {
    pub pid: u32,
    pub module: MemoryRegion,
    pub anchors: Vec<ResolvedAnchor>,
    pub patterns_version: String,
    pub schemas_version: String,
    pub attached_at: DateTime<Local>,
}

struct Attachment<S: MemorySource> {
    reader: MemoryReader<S>,
    module: MemoryRegion,
    anchors: Vec<ResolvedAnchor>,
}

pub struct Engine<S: MemorySource = ProcessHandle> {
    config: EngineConfig,
    schemas: SchemaRegistry,
    cache: RemoteObjectCache,
    params: Parameters,
    attachment: Option<Attachment<S>>,
}

impl<S: MemorySource> Engine<S> {
    /// Engine with the built-in pattern and schema tables
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Fails with `SchemaMismatch` when a configured schema is malformed
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.patterns.validate()?;
        let schemas = SchemaRegistry::new(config.schemas.clone())?;
        debug!(
            "Engine ready: {} patterns ({}), {} schemas ({})",
            config.patterns.entries.len(),
            config.patterns.version,
            schemas.len(),
            schemas.version()
        );

        Ok(Self {
            config,
            schemas,
            cache: RemoteObjectCache::new(),
            params: Parameters::new(),
            attachment: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Accessor of the current attachment
    pub fn reader(&self) -> Option<&MemoryReader<S>> {
        self.attachment.as_ref().map(|attachment| &attachment.reader)
    }

    /// Module root discovery scanned
    pub fn module(&self) -> Option<&MemoryRegion> {
        self.attachment.as_ref().map(|attachment| &attachment.module)
    }

    pub fn anchors(&self) -> &[ResolvedAnchor] {
        self.attachment
            .as_ref()
            .map(|attachment| attachment.anchors.as_slice())
            .unwrap_or_default()
    }

    /// Attach to an already opened memory source.
    ///
    /// Any previous attachment is dropped first. A pattern that cannot be
    /// found aborts the attach and leaves the engine detached.
    pub fn attach_source(&mut self, source: S) -> Result<AttachInfo> {
        self.detach();

        let pid = source.pid();
        let reader = MemoryReader::with_max_read_size(source, self.config.max_read_size);
        let module = select_module(reader.modules()?, self.config.module.as_deref())?;
        info!(
            "Attached to pid {} ({} at {:#x}, {} bytes)",
            pid,
            module.name.as_deref().unwrap_or("?"),
            module.base,
            module.size
        );

        let anchors = match discover(
            &reader,
            &module,
            &self.config.patterns,
            self.config.scan_chunk_size,
        ) {
            Ok(anchors) => anchors,
            Err(e) => {
                warn!("Root discovery failed: {}", e);
                reader.detach();
                return Err(e);
            }
        };

        let info = AttachInfo {
            pid,
            module: module.clone(),
            anchors: anchors.clone(),
            patterns_version: self.config.patterns.version.clone(),
            schemas_version: self.schemas.version().to_string(),
            attached_at: Local::now(),
        };
        self.attachment = Some(Attachment {
            reader,
            module,
            anchors,
        });
        Ok(info)
    }

    /// Anchor address of a root pattern
    pub fn find_anchor(&self, name: &str) -> Result<u64> {
        let attachment = self.attachment.as_ref().ok_or(Error::NotAttached)?;
        attachment
            .anchors
            .iter()
            .find(|anchor| anchor.name.eq_ignore_ascii_case(name))
            .map(|anchor| anchor.address)
            .ok_or_else(|| Error::PatternNotFound(name.to_string()))
    }

    /// Static address a root pattern points at (RIP displacement, deref, addend)
    pub fn resolve_anchor(&self, name: &str) -> Result<u64> {
        let anchor = self.find_anchor(name)?;
        let entry = self
            .config
            .patterns
            .entry(name)
            .ok_or_else(|| Error::PatternNotFound(name.to_string()))?;
        let reader = self.reader().ok_or(Error::NotAttached)?;
        let address = entry.resolve(reader, anchor)?;
        debug!("{}: anchor {:#x} -> {:#x}", entry.name, anchor, address);
        Ok(address)
    }

    /// Every match of an ad-hoc pattern inside the scanned module
    pub fn scan(&self, pattern: &MemoryPattern) -> Result<Vec<u64>> {
        let attachment = self.attachment.as_ref().ok_or(Error::NotAttached)?;
        Scanner::with_chunk_size(&attachment.reader, self.config.scan_chunk_size)
            .find_all(pattern, &attachment.module)
    }

    pub fn track(
        &mut self,
        address: u64,
        schema_name: &str,
        slot: IdentitySlot,
    ) -> Result<ObjectHandle> {
        if self.attachment.is_none() {
            return Err(Error::NotAttached);
        }
        let schema = self.schemas.get(schema_name)?.clone();
        self.cache.track(address, schema, slot)
    }

    /// Track the object an address field of `parent` points at
    pub fn follow(
        &mut self,
        parent: ObjectHandle,
        field: &str,
        schema_name: &str,
        slot: IdentitySlot,
    ) -> Result<ObjectHandle> {
        if self.attachment.is_none() {
            return Err(Error::NotAttached);
        }
        let schema = self.schemas.get(schema_name)?.clone();
        self.cache.follow(parent, field, schema, slot)
    }

    pub fn untrack(&mut self, handle: ObjectHandle) -> Result<()> {
        self.cache.untrack(handle)
    }

    /// The object behind `handle` now represents a different logical entity
    pub fn mark_changed(&mut self, handle: ObjectHandle) -> Result<()> {
        self.cache.mark_changed(handle)
    }

    pub fn snapshot(&self, handle: ObjectHandle) -> Result<SnapshotView> {
        self.cache.snapshot(handle)
    }

    /// Cloneable read handle for consumers on other threads
    pub fn snapshots(&self) -> SnapshotReader {
        self.cache.reader()
    }

    /// Takes effect from the next tick; returns the previous value
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Option<f64> {
        debug!("Parameter {} = {}", name, value);
        self.params.set(name, value)
    }

    /// One refresh pass over every tracked object
    pub fn tick(&mut self) -> Result<TickReport> {
        let attachment = self.attachment.as_ref().ok_or(Error::NotAttached)?;
        if !attachment.reader.is_alive() {
            info!("Target process has exited");
            self.detach();
            return Err(Error::ProcessExited);
        }

        let report = self.cache.refresh(&attachment.reader, &self.params);
        if report.is_clean() {
            debug!("Tick {}: {} refreshed", report.tick, report.refreshed);
        } else {
            debug!(
                "Tick {}: {} refreshed, {} invalid",
                report.tick,
                report.refreshed,
                report.failures.len()
            );
        }
        Ok(report)
    }

    /// Detect a moved module base.
    ///
    /// On a move the roots are scanned again at the new base, then every
    /// tracked object is cleared. A failed scan leaves the old module and
    /// objects in place, so the next check retries the move.
    pub fn check_relocation(&mut self) -> Result<bool> {
        let attachment = self.attachment.as_ref().ok_or(Error::NotAttached)?;
        let current = select_module(attachment.reader.modules()?, self.config.module.as_deref())?;
        if current.base == attachment.module.base && current.size == attachment.module.size {
            return Ok(false);
        }

        info!(
            "Module moved from {:#x} to {:#x}, re-anchoring",
            attachment.module.base, current.base
        );
        let anchors = discover(
            &attachment.reader,
            &current,
            &self.config.patterns,
            self.config.scan_chunk_size,
        )?;
        self.cache.clear();
        if let Some(attachment) = self.attachment.as_mut() {
            attachment.module = current;
            attachment.anchors = anchors;
        }
        Ok(true)
    }

    /// Scan the root patterns again in the current module
    pub fn reanchor(&mut self) -> Result<()> {
        let attachment = self.attachment.as_mut().ok_or(Error::NotAttached)?;
        attachment.anchors = discover(
            &attachment.reader,
            &attachment.module,
            &self.config.patterns,
            self.config.scan_chunk_size,
        )?;
        Ok(())
    }

    /// Drop the process handle and every tracked object. Safe to call twice.
    pub fn detach(&mut self) {
        self.cache.clear();
        if let Some(attachment) = self.attachment.take() {
            attachment.reader.detach();
            info!("Detached");
        }
    }
}

impl Engine<ProcessHandle> {
    /// Open the selected process and run root discovery
    pub fn attach(&mut self, selector: &ProcessSelector) -> Result<AttachInfo> {
        let process = ProcessHandle::open_selected(selector)?;
        self.attach_source(process)
    }

    /// Attach to the process named in the configuration
    pub fn attach_configured(&mut self) -> Result<AttachInfo> {
        let selector = self
            .config
            .process
            .clone()
            .ok_or_else(|| Error::ProcessNotFound("No process configured".to_string()))?;
        self.attach(&selector)
    }
}

fn select_module(modules: Vec<MemoryRegion>, wanted: Option<&str>) -> Result<MemoryRegion> {
    match wanted {
        Some(name) => modules
            .into_iter()
            .find(|module| module.is_named(name))
            .ok_or_else(|| Error::ProcessOpenFailed(format!("Module '{}' is not loaded", name))),
        None => modules
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProcessOpenFailed("Process has no loaded modules".to_string())),
    }
}

fn discover<S: MemorySource>(
    reader: &MemoryReader<S>,
    module: &MemoryRegion,
    patterns: &PatternSet,
    chunk_size: usize,
) -> Result<Vec<ResolvedAnchor>> {
    if patterns.entries.is_empty() {
        return Ok(Vec::new());
    }

    info!(
        "Scanning {:#x}..{:#x} for {} root patterns",
        module.base,
        module.end(),
        patterns.entries.len()
    );
    let scanner = Scanner::with_chunk_size(reader, chunk_size);
    patterns
        .entries
        .iter()
        .map(|entry: &PatternEntry| {
            let address = scanner
                .find_first(&entry.pattern, module)
                .map_err(|e| match e {
                    Error::PatternNotFound(_) => Error::PatternNotFound(entry.name.clone()),
                    other => other,
                })?;
            debug!("Found {} at {:#x}", entry.name, address);
            Ok(ResolvedAnchor {
                name: entry.name.clone(),
                address,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FailureKind;
    use crate::memory::{MockMemory, MockMemoryBuilder};
    use crate::node::{Node, WINDOW_SCALE};
    use crate::schema::{GAME_STATE, GAME_STATE_STATIC, MAP_UI_ELEMENT};

    const BASE: u64 = 0x1_4000_0000;
    const MOVED: u64 = 0x1_5000_0000;
    const HEAP: u64 = 0x2000_0000;

    /// `mov rax, [rip+disp]; test rax, rax` pointing at `base + 0x800`
    fn write_root(mock: &MockMemory, base: u64) {
        let code = base + 0x100;
        let disp = (base + 0x800) as i64 - (code + 3 + 4) as i64;
        mock.poke(code, &[0x48, 0x8B, 0x05]);
        mock.poke(code + 3, &(disp as i32).to_le_bytes());
        mock.poke(code + 7, &[0x48, 0x85, 0xC0]);
        mock.poke_u64(base + 0x800, HEAP + 0x400);
    }

    fn patterns() -> PatternSet {
        PatternSet {
            version: "test-1".to_string(),
            entries: vec![
                PatternEntry::new("Game States", "48 8B 05 ^ ?? ?? ?? ?? 48 85 C0")
                    .unwrap()
                    .rip_relative(),
            ],
        }
    }

    fn target() -> MockMemory {
        let mock = MockMemoryBuilder::new()
            .zeroed(BASE, 0x1000)
            .zeroed(MOVED, 0x1000)
            .zeroed(HEAP, 0x1000)
            .module(MemoryRegion::named(BASE, 0x1000, "mock.exe"))
            .pid(31337)
            .build();
        write_root(&mock, BASE);
        write_root(&mock, MOVED);

        // GameState at HEAP + 0x400
        mock.poke_u64(HEAP + 0x400 + 0x48, HEAP + 0x800);
        mock.poke_u64(HEAP + 0x400 + 0x50, 3);

        // MapUiElement at HEAP + 0x200
        mock.poke_u64(HEAP + 0x200, HEAP + 0x200);
        mock.poke_f32(HEAP + 0x200 + 0x30, 10.0);
        mock.poke_f32(HEAP + 0x200 + 0x34, -6.0);
        mock.poke_f32(HEAP + 0x200 + 0x40, 1.5);
        mock
    }

    fn engine() -> Engine<MockMemory> {
        let config = EngineConfig::builder().patterns(patterns()).build();
        Engine::with_config(config).unwrap()
    }

    #[test]
    fn test_attach_discovers_roots() {
        let mut engine = engine();
        let info = engine.attach_source(target()).unwrap();

        assert_eq!(info.pid, 31337);
        assert_eq!(info.module.base, BASE);
        assert_eq!(info.patterns_version, "test-1");
        assert_eq!(
            info.anchors,
            vec![ResolvedAnchor {
                name: "Game States".to_string(),
                address: BASE + 0x103,
            }]
        );
        assert_eq!(engine.find_anchor("game states").unwrap(), BASE + 0x103);
        assert_eq!(engine.resolve_anchor("Game States").unwrap(), BASE + 0x800);
        assert!(matches!(
            engine.find_anchor("File Root"),
            Err(Error::PatternNotFound(name)) if name == "File Root"
        ));
    }

    #[test]
    fn test_attach_fails_on_missing_pattern() {
        let mock = MockMemoryBuilder::new().zeroed(BASE, 0x1000).build();
        let probe = mock.clone();
        let mut engine = engine();

        match engine.attach_source(mock) {
            Err(Error::PatternNotFound(name)) => assert_eq!(name, "Game States"),
            other => panic!("expected PatternNotFound, got {:?}", other.map(|i| i.pid)),
        }
        assert!(!engine.is_attached());
        assert!(probe.read_count() > 0);
        assert!(matches!(engine.tick(), Err(Error::NotAttached)));
    }

    #[test]
    fn test_attach_with_named_module() {
        let mock = MockMemoryBuilder::new()
            .zeroed(HEAP, 0x1000)
            .zeroed(BASE, 0x1000)
            .build();
        write_root(&mock, BASE);

        let config = EngineConfig::builder()
            .patterns(patterns())
            .module("SEGMENT1.DLL")
            .build();
        let mut engine: Engine<MockMemory> = Engine::with_config(config).unwrap();
        let info = engine.attach_source(mock).unwrap();
        assert_eq!(info.module.base, BASE);

        let config = EngineConfig::builder().module("absent.dll").build();
        let mut engine: Engine<MockMemory> = Engine::with_config(config).unwrap();
        assert!(matches!(
            engine.attach_source(target()),
            Err(Error::ProcessOpenFailed(_))
        ));
    }

    #[test]
    fn test_operations_require_attach() {
        let mut engine = engine();
        assert!(matches!(
            engine.track(HEAP, MAP_UI_ELEMENT, IdentitySlot(1)),
            Err(Error::NotAttached)
        ));
        assert!(matches!(engine.find_anchor("Game States"), Err(Error::NotAttached)));
        assert!(matches!(engine.check_relocation(), Err(Error::NotAttached)));
        engine.detach();
    }

    #[test]
    fn test_track_unknown_schema() {
        let mut engine = engine();
        engine.attach_source(target()).unwrap();
        assert!(matches!(
            engine.track(HEAP, "NoSuchThing", IdentitySlot(1)),
            Err(Error::UnknownSchema(_))
        ));
    }

    #[test]
    fn test_root_to_game_state_chain() {
        let mut engine = engine();
        engine.attach_source(target()).unwrap();

        let root = engine.resolve_anchor("Game States").unwrap();
        let root = engine
            .track(root, GAME_STATE_STATIC, IdentitySlot::from_name("root"))
            .unwrap();
        let state = engine
            .follow(root, "game_state", GAME_STATE, IdentitySlot::from_name("state"))
            .unwrap();

        engine.tick().unwrap();
        engine.tick().unwrap();

        let snapshot = engine.snapshot(state).unwrap();
        let snapshot = snapshot.latest().unwrap();
        assert_eq!(snapshot.address, HEAP + 0x400);
        match &snapshot.node {
            Node::GameState(node) => {
                assert_eq!(node.states_head, HEAP + 0x800);
                assert_eq!(node.state_count, 3);
                assert!(node.has_states);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_window_scale_parameter() {
        let mut engine = engine();
        engine.attach_source(target()).unwrap();
        let map = engine
            .track(HEAP + 0x200, MAP_UI_ELEMENT, IdentitySlot::from_name("map"))
            .unwrap();

        engine.tick().unwrap();
        let shift = engine.snapshot(map).unwrap().latest().unwrap().node.as_map().unwrap().shift;
        assert_eq!((shift.x, shift.y), (10.0, -6.0));

        assert_eq!(engine.set_parameter(WINDOW_SCALE, 2.0), Some(1.0));
        engine.tick().unwrap();
        let snapshot = engine.snapshot(map).unwrap();
        let map_node = snapshot.latest().unwrap().node.as_map().unwrap();
        assert_eq!((map_node.shift.x, map_node.shift.y), (5.0, -3.0));
        assert_eq!(map_node.zoom, 1.5);
    }

    #[test]
    fn test_transient_failure_through_engine() {
        let mock = target();
        let probe = mock.clone();
        let mut engine = engine();
        engine.attach_source(mock).unwrap();
        let map = engine
            .track(HEAP + 0x200, MAP_UI_ELEMENT, IdentitySlot(1))
            .unwrap();
        engine.tick().unwrap();

        probe.poke_u64(HEAP + 0x200, 0);
        let report = engine.tick().unwrap();
        assert_eq!(report.failures.len(), 1);
        let view = engine.snapshot(map).unwrap();
        assert_eq!(view.failure().unwrap().kind, FailureKind::SelfConsistency);
        assert!(view.latest().is_some());
    }

    #[test]
    fn test_process_exit_detaches() {
        let mock = target();
        let probe = mock.clone();
        let mut engine = engine();
        engine.attach_source(mock).unwrap();
        let map = engine
            .track(HEAP + 0x200, MAP_UI_ELEMENT, IdentitySlot(1))
            .unwrap();
        engine.tick().unwrap();

        probe.set_alive(false);
        assert!(matches!(engine.tick(), Err(Error::ProcessExited)));
        assert!(!engine.is_attached());
        assert_eq!(engine.snapshot(map).unwrap(), SnapshotView::Cleared);
    }

    #[test]
    fn test_relocation_clears_and_reanchors() {
        let mock = target();
        let probe = mock.clone();
        let mut engine = engine();
        engine.attach_source(mock).unwrap();
        let map = engine
            .track(HEAP + 0x200, MAP_UI_ELEMENT, IdentitySlot(1))
            .unwrap();
        engine.tick().unwrap();
        assert!(!engine.check_relocation().unwrap());

        probe.set_modules(vec![MemoryRegion::named(MOVED, 0x1000, "mock.exe")]);
        assert!(engine.check_relocation().unwrap());
        assert_eq!(engine.module().unwrap().base, MOVED);
        assert_eq!(engine.find_anchor("Game States").unwrap(), MOVED + 0x103);
        assert_eq!(engine.resolve_anchor("Game States").unwrap(), MOVED + 0x800);
        assert_eq!(engine.snapshot(map).unwrap(), SnapshotView::Cleared);
        assert!(!engine.check_relocation().unwrap());
    }

    #[test]
    fn test_failed_relocation_is_retried() {
        let mock = target();
        let remote = mock.clone();
        let mut engine = engine();
        engine.attach_source(mock).unwrap();
        let map = engine
            .track(HEAP + 0x200, MAP_UI_ELEMENT, IdentitySlot(1))
            .unwrap();
        engine.tick().unwrap();

        // Moved module whose root code is not there yet
        remote.poke(MOVED + 0x100, &[0u8; 10]);
        remote.set_modules(vec![MemoryRegion::named(MOVED, 0x1000, "mock.exe")]);
        assert!(matches!(
            engine.check_relocation(),
            Err(Error::PatternNotFound(name)) if name == "Game States"
        ));
        assert_eq!(engine.module().unwrap().base, BASE);
        assert_eq!(engine.find_anchor("Game States").unwrap(), BASE + 0x103);
        assert!(engine.snapshot(map).unwrap().is_valid());

        write_root(&remote, MOVED);
        assert!(engine.check_relocation().unwrap());
        assert_eq!(engine.module().unwrap().base, MOVED);
        assert_eq!(engine.find_anchor("Game States").unwrap(), MOVED + 0x103);
        assert_eq!(engine.snapshot(map).unwrap(), SnapshotView::Cleared);
    }

    #[test]
    fn test_detach_fails_reads_and_clears() {
        let mut engine = engine();
        engine.attach_source(target()).unwrap();
        let snapshots = engine.snapshots();
        let map = engine
            .track(HEAP + 0x200, MAP_UI_ELEMENT, IdentitySlot(1))
            .unwrap();
        engine.tick().unwrap();
        assert!(snapshots.get(map).unwrap().is_valid());

        engine.detach();
        engine.detach();
        assert!(engine.reader().is_none());
        assert_eq!(snapshots.get(map), Some(SnapshotView::Cleared));
        assert!(matches!(engine.tick(), Err(Error::NotAttached)));
    }

    #[test]
    fn test_reattach_starts_clean() {
        let mut engine = engine();
        engine.attach_source(target()).unwrap();
        let first = engine
            .track(HEAP + 0x200, MAP_UI_ELEMENT, IdentitySlot(1))
            .unwrap();

        engine.attach_source(target()).unwrap();
        assert_eq!(engine.snapshot(first).unwrap(), SnapshotView::Cleared);
        let second = engine
            .track(HEAP + 0x200, MAP_UI_ELEMENT, IdentitySlot(1))
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_ad_hoc_scan() {
        let mut engine = engine();
        engine.attach_source(target()).unwrap();
        let pattern: MemoryPattern = "48 85 C0".parse().unwrap();
        assert_eq!(engine.scan(&pattern).unwrap(), vec![BASE + 0x107]);
    }

    #[test]
    fn test_malformed_schema_rejected() {
        use crate::schema::{DecodeKind, FieldDef, SchemaSet, StructSchema};

        let config = EngineConfig::builder()
            .schemas(SchemaSet {
                version: "bad".to_string(),
                schemas: vec![StructSchema::new(
                    "Overlap",
                    8,
                    vec![
                        FieldDef::new("a", 0, DecodeKind::U64),
                        FieldDef::new("b", 4, DecodeKind::U32),
                    ],
                )],
            })
            .build();
        assert!(matches!(
            Engine::<MockMemory>::with_config(config),
            Err(Error::SchemaMismatch { .. })
        ));
    }
}
