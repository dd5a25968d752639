//! Process memory access.
//!
//! - `MemorySource`: backend that copies bytes out of a foreign address space
//! - `MemoryReader`: the bounded, serialized accessor every other component reads through
//! - `ProcessHandle`: live process backend (Linux `/proc`, Windows `ReadProcessMemory`)

mod process;
mod reader;
mod region;
mod source;

#[cfg(test)]
pub mod mock;

pub use process::*;
pub use reader::{DEFAULT_MAX_READ_SIZE, MemoryReader, ReadMemory};
pub use region::MemoryRegion;
pub use source::MemorySource;

#[cfg(test)]
pub use mock::{MockMemory, MockMemoryBuilder};
