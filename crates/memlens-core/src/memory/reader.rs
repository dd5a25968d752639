use parking_lot::Mutex;
use tracing::debug;

use super::{MemoryRegion, MemorySource};
use crate::error::{Error, Result};

/// Upper bound for a single read (16MB)
pub const DEFAULT_MAX_READ_SIZE: usize = 16 * 1024 * 1024;

/// Bounded reads from a foreign address space.
pub trait ReadMemory {
    /// Read exactly `size` bytes at `address`; short reads are errors
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Largest request `read_bytes` accepts
    fn max_read_size(&self) -> usize {
        DEFAULT_MAX_READ_SIZE
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let bytes = self.read_bytes(address, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(raw))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// The process memory accessor.
///
/// Wraps a [`MemorySource`] behind a mutex so reads against the single foreign
/// handle are serialized, validates every request before it reaches the
/// source, and turns short copies into [`Error::PartialRead`]. After
/// [`detach`](Self::detach) every read fails with [`Error::Detached`].
pub struct MemoryReader<S: MemorySource> {
    source: Mutex<Option<S>>,
    max_read_size: usize,
}

impl<S: MemorySource> MemoryReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_max_read_size(source, DEFAULT_MAX_READ_SIZE)
    }

    pub fn with_max_read_size(source: S, max_read_size: usize) -> Self {
        Self {
            source: Mutex::new(Some(source)),
            max_read_size: max_read_size.max(1),
        }
    }

    /// Drop the underlying handle. Returns the source if it was still attached.
    pub fn detach(&self) -> Option<S> {
        let source = self.source.lock().take();
        if source.is_some() {
            debug!("Memory reader detached");
        }
        source
    }

    pub fn is_attached(&self) -> bool {
        self.source.lock().is_some()
    }

    /// Attached and the foreign process still running
    pub fn is_alive(&self) -> bool {
        self.source
            .lock()
            .as_ref()
            .is_some_and(|source| source.is_alive())
    }

    pub fn pid(&self) -> Option<u32> {
        self.source.lock().as_ref().map(|source| source.pid())
    }

    pub fn modules(&self) -> Result<Vec<MemoryRegion>> {
        match self.source.lock().as_ref() {
            Some(source) => source.modules(),
            None => Err(Error::Detached),
        }
    }

    fn validate_request(&self, address: u64, size: usize) -> Result<()> {
        if address == 0 {
            return Err(Error::AddressInvalid { address });
        }
        if size > self.max_read_size {
            return Err(Error::ReadTooLarge {
                size,
                max: self.max_read_size,
            });
        }
        if address.checked_add(size as u64).is_none() {
            return Err(Error::AddressInvalid { address });
        }
        Ok(())
    }
}

impl<S: MemorySource> ReadMemory for MemoryReader<S> {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.validate_request(address, size)?;
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; size];
        let copied = {
            let guard = self.source.lock();
            let source = guard.as_ref().ok_or(Error::Detached)?;
            source.read_into(address, &mut buffer)?
        };

        if copied < size {
            return Err(Error::PartialRead {
                address,
                expected: size,
                actual: copied,
            });
        }

        Ok(buffer)
    }

    fn max_read_size(&self) -> usize {
        self.max_read_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockMemoryBuilder;

    fn reader() -> MemoryReader<crate::memory::MockMemory> {
        let mock = MockMemoryBuilder::new()
            .segment(0x1000, vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08])
            .build();
        MemoryReader::with_max_read_size(mock, 64)
    }

    #[test]
    fn test_read_bytes() {
        let reader = reader();
        assert_eq!(reader.read_bytes(0x1002, 3).unwrap(), vec![0x03, 0x04, 0x05]);
        assert_eq!(reader.read_u64(0x1000).unwrap(), 0x0807060504030201);
        assert_eq!(reader.read_u32(0x1004).unwrap(), 0x08070605);
    }

    #[test]
    fn test_zero_address_is_invalid() {
        let reader = reader();
        assert!(matches!(
            reader.read_bytes(0, 4),
            Err(Error::AddressInvalid { address: 0 })
        ));
    }

    #[test]
    fn test_oversized_read_rejected_before_source() {
        let mock = MockMemoryBuilder::new().segment(0x1000, vec![0; 8]).build();
        let probe = mock.clone();
        let reader = MemoryReader::with_max_read_size(mock, 64);

        assert!(matches!(
            reader.read_bytes(0x1000, 65),
            Err(Error::ReadTooLarge { size: 65, max: 64 })
        ));
        assert_eq!(probe.read_count(), 0);
    }

    #[test]
    fn test_overflowing_range_is_invalid() {
        let reader = reader();
        assert!(matches!(
            reader.read_bytes(u64::MAX - 2, 8),
            Err(Error::AddressInvalid { .. })
        ));
    }

    #[test]
    fn test_short_copy_is_partial_read() {
        let reader = reader();
        match reader.read_bytes(0x1004, 8) {
            Err(Error::PartialRead {
                address,
                expected,
                actual,
            }) => {
                assert_eq!(address, 0x1004);
                assert_eq!(expected, 8);
                assert_eq!(actual, 4);
            }
            other => panic!("expected PartialRead, got {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_address_fails() {
        let reader = reader();
        assert!(matches!(
            reader.read_bytes(0x9000, 4),
            Err(Error::AddressInvalid { address: 0x9000 })
        ));
    }

    #[test]
    fn test_detach_fails_all_reads() {
        let reader = reader();
        assert!(reader.is_attached());
        assert!(reader.detach().is_some());
        assert!(!reader.is_attached());
        assert!(!reader.is_alive());
        assert!(matches!(reader.read_bytes(0x1000, 4), Err(Error::Detached)));
        assert!(matches!(reader.modules(), Err(Error::Detached)));
        assert!(reader.detach().is_none());
    }

    #[test]
    fn test_empty_read() {
        let reader = reader();
        assert!(reader.read_bytes(0x1000, 0).unwrap().is_empty());
    }
}
