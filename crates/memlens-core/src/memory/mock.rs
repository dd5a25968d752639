//! Mock memory source
//!
//! An in-memory stand-in for a foreign process. Clones share the same image so
//! a test can mutate "foreign" memory between ticks while the reader owns the
//! source.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{MemoryRegion, MemorySource};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MockState {
    segments: Vec<(u64, Vec<u8>)>,
    denied: Vec<MemoryRegion>,
    modules: Vec<MemoryRegion>,
    alive: bool,
    pid: u32,
}

#[derive(Debug, Clone)]
pub struct MockMemory {
    state: Arc<RwLock<MockState>>,
    reads: Arc<AtomicUsize>,
}

impl MockMemory {
    /// Overwrite bytes in the image. The target range must lie inside one segment.
    pub fn poke(&self, address: u64, bytes: &[u8]) {
        let mut state = self.state.write();
        let segment = state
            .segments
            .iter_mut()
            .find(|(base, data)| {
                address >= *base && address + bytes.len() as u64 <= *base + data.len() as u64
            })
            .expect("poke outside of mock segments");
        let offset = (address - segment.0) as usize;
        segment.1[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn poke_u64(&self, address: u64, value: u64) {
        self.poke(address, &value.to_le_bytes());
    }

    pub fn poke_f32(&self, address: u64, value: f32) {
        self.poke(address, &value.to_le_bytes());
    }

    /// Make reads starting inside `region` fail with `AccessDenied`
    pub fn deny(&self, region: MemoryRegion) {
        self.state.write().denied.push(region);
    }

    pub fn allow_all(&self) {
        self.state.write().denied.clear();
    }

    pub fn set_alive(&self, alive: bool) {
        self.state.write().alive = alive;
    }

    pub fn set_modules(&self, modules: Vec<MemoryRegion>) {
        self.state.write().modules = modules;
    }

    /// Number of `read_into` calls that reached this source
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MemorySource for MockMemory {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read();

        if state.denied.iter().any(|region| region.contains(address)) {
            return Err(Error::AccessDenied {
                address,
                size: buf.len(),
            });
        }

        let (base, data) = state
            .segments
            .iter()
            .find(|(base, data)| address >= *base && address < *base + data.len() as u64)
            .ok_or(Error::AddressInvalid { address })?;

        let offset = (address - base) as usize;
        let available = (data.len() - offset).min(buf.len());
        buf[..available].copy_from_slice(&data[offset..offset + available]);
        Ok(available)
    }

    fn modules(&self) -> Result<Vec<MemoryRegion>> {
        Ok(self.state.read().modules.clone())
    }

    fn is_alive(&self) -> bool {
        self.state.read().alive
    }

    fn pid(&self) -> u32 {
        self.state.read().pid
    }
}

/// Builder for [`MockMemory`]
#[derive(Debug, Default)]
pub struct MockMemoryBuilder {
    segments: Vec<(u64, Vec<u8>)>,
    modules: Vec<MemoryRegion>,
    pid: Option<u32>,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment(mut self, base: u64, bytes: Vec<u8>) -> Self {
        self.segments.push((base, bytes));
        self
    }

    /// Zero-filled segment
    pub fn zeroed(self, base: u64, size: usize) -> Self {
        self.segment(base, vec![0; size])
    }

    pub fn module(mut self, region: MemoryRegion) -> Self {
        self.modules.push(region);
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Without explicit modules every segment becomes one, the first named `mock.exe`
    pub fn build(self) -> MockMemory {
        let modules = if self.modules.is_empty() {
            self.segments
                .iter()
                .enumerate()
                .map(|(i, (base, data))| {
                    let name = if i == 0 {
                        "mock.exe".to_string()
                    } else {
                        format!("segment{}.dll", i)
                    };
                    MemoryRegion::named(*base, data.len(), name)
                })
                .collect()
        } else {
            self.modules
        };

        MockMemory {
            state: Arc::new(RwLock::new(MockState {
                segments: self.segments,
                denied: Vec::new(),
                modules,
                alive: true,
                pid: self.pid.unwrap_or(4242),
            })),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_read_into() {
        let mock = MockMemoryBuilder::new()
            .segment(0x1000, vec![0x41, 0x42, 0x43, 0x44])
            .build();

        let mut buf = [0u8; 2];
        assert_eq!(mock.read_into(0x1001, &mut buf).unwrap(), 2);
        assert_eq!(buf, [0x42, 0x43]);
        assert_eq!(mock.read_count(), 1);
    }

    #[test]
    fn test_mock_short_copy_at_segment_end() {
        let mock = MockMemoryBuilder::new().segment(0x1000, vec![1, 2, 3, 4]).build();
        let mut buf = [0u8; 8];
        assert_eq!(mock.read_into(0x1002, &mut buf).unwrap(), 2);
    }

    #[test]
    fn test_mock_denied_region() {
        let mock = MockMemoryBuilder::new().zeroed(0x1000, 0x100).build();
        mock.deny(MemoryRegion::new(0x1000, 0x10));

        let mut buf = [0u8; 4];
        assert!(matches!(
            mock.read_into(0x1004, &mut buf),
            Err(Error::AccessDenied { address: 0x1004, .. })
        ));
        assert!(mock.read_into(0x1020, &mut buf).is_ok());

        mock.allow_all();
        assert!(mock.read_into(0x1004, &mut buf).is_ok());
    }

    #[test]
    fn test_mock_clones_share_image() {
        let mock = MockMemoryBuilder::new().zeroed(0x1000, 16).build();
        let other = mock.clone();
        other.poke_u64(0x1008, 0xDEADBEEF);

        let mut buf = [0u8; 8];
        mock.read_into(0x1008, &mut buf).unwrap();
        assert_eq!(u64::from_le_bytes(buf), 0xDEADBEEF);
    }

    #[test]
    fn test_mock_default_modules() {
        let mock = MockMemoryBuilder::new()
            .zeroed(0x140000000, 0x1000)
            .zeroed(0x7FF000000000, 0x100)
            .build();
        let modules = mock.modules().unwrap();
        assert_eq!(modules.len(), 2);
        assert!(modules[0].is_named("mock.exe"));
        assert_eq!(modules[1].base, 0x7FF000000000);
    }
}
