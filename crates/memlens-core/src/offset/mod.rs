//! Signature scanning and anchor resolution

mod pattern;
mod scanner;
mod table;

pub use pattern::MemoryPattern;
pub use scanner::{DEFAULT_SCAN_CHUNK_SIZE, Matches, Scanner};
pub use table::*;
