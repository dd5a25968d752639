//! Debug utilities for inspecting foreign memory
//!
//! - Raw byte dumps in hexdump layout (`MemoryDump`)

mod dump;

pub use dump::MemoryDump;
