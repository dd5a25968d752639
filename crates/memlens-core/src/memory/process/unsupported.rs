use super::ProcessSelector;
use crate::error::{Error, Result};
use crate::memory::{MemoryRegion, MemorySource};

/// Placeholder for platforms without a process backend
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
}

impl ProcessHandle {
    pub fn open(_pid: u32) -> Result<Self> {
        Err(Error::Unsupported(
            "process attachment is only available on Linux and Windows".to_string(),
        ))
    }

    pub fn find(_selector: &ProcessSelector) -> Result<u32> {
        Err(Error::Unsupported(
            "process lookup is only available on Linux and Windows".to_string(),
        ))
    }
}

impl MemorySource for ProcessHandle {
    fn read_into(&self, _address: u64, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::Unsupported("memory reads".to_string()))
    }

    fn modules(&self) -> Result<Vec<MemoryRegion>> {
        Err(Error::Unsupported("module enumeration".to_string()))
    }

    fn is_alive(&self) -> bool {
        false
    }

    fn pid(&self) -> u32 {
        self.pid
    }
}
