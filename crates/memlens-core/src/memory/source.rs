//! Memory source trait

use super::MemoryRegion;
use crate::error::Result;

/// Backend that copies bytes out of a foreign address space.
///
/// Implementations report how many bytes were actually copied; the accessor
/// decides what a short copy means. They never retry.
pub trait MemorySource: Send {
    /// Copy bytes starting at `address` into `buf`, returning the number copied
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<usize>;

    /// Loaded module bounds, main executable first
    fn modules(&self) -> Result<Vec<MemoryRegion>>;

    /// Whether the foreign process is still running
    fn is_alive(&self) -> bool;

    fn pid(&self) -> u32;
}
