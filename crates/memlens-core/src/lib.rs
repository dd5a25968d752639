//! # memlens-core
//!
//! Remote memory introspection engine.
//!
//! This crate provides:
//! - Bounded, failure-aware reads of a foreign process (`/proc/<pid>/mem`, `ReadProcessMemory`)
//! - Wildcard byte-pattern scanning for root anchors
//! - Versioned structure schemas and a single-read typed overlay decoder
//! - A per-tick object cache publishing immutable snapshots
//!
//! ## Feature Flags
//!
//! - `debug-tools`: Enables raw memory dump helpers for CLI tools and development.

pub mod cache;
pub mod config;
#[cfg(feature = "debug-tools")]
pub mod debug;
pub mod engine;
pub mod error;
pub mod memory;
pub mod node;
pub mod offset;
pub mod overlay;
pub mod schema;

pub use cache::{
    FailureKind, IdentitySlot, ObjectHandle, ObjectSnapshot, ObjectStatus, RemoteObjectCache,
    SnapshotReader, SnapshotView, TickFailure, TickReport,
};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{AttachInfo, Engine, ResolvedAnchor};
pub use error::{Error, Result};
pub use memory::{
    DEFAULT_MAX_READ_SIZE, MemoryReader, MemoryRegion, MemorySource, ProcessHandle,
    ProcessSelector, ReadMemory,
};
pub use node::{Node, NodeKind, Parameters, Vec2, WINDOW_SCALE};
pub use offset::{
    AnchorResolve, DEFAULT_SCAN_CHUNK_SIZE, MemoryPattern, PatternEntry, PatternSet, Scanner,
    builtin_patterns, load_patterns, save_patterns,
};
pub use overlay::{Record, Value, decode};
pub use schema::{
    DecodeKind, FieldDef, SchemaRegistry, SchemaSet, StructSchema, TextEncoding,
    builtin_schemas, load_schemas, save_schemas,
};

#[cfg(feature = "debug-tools")]
pub use debug::MemoryDump;
