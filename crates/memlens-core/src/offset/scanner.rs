//! Chunked wildcard scanner over foreign memory

use tracing::debug;

use super::MemoryPattern;
use crate::error::{Error, Result};
use crate::memory::{MemoryRegion, ReadMemory};

/// Default read size per scan step (64KB)
pub const DEFAULT_SCAN_CHUNK_SIZE: usize = 64 * 1024;

pub struct Scanner<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    chunk_size: usize,
}

impl<'a, R: ReadMemory + ?Sized> Scanner<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_SCAN_CHUNK_SIZE)
    }

    /// Chunk size is clamped to `[1, reader.max_read_size()]`
    pub fn with_chunk_size(reader: &'a R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.clamp(1, reader.max_read_size().max(1)),
        }
    }

    /// Lazily scan `region`, yielding anchor-adjusted match addresses in order
    pub fn scan<'p>(&self, pattern: &'p MemoryPattern, region: &MemoryRegion) -> Matches<'a, 'p, R> {
        Matches {
            reader: self.reader,
            pattern,
            chunk_size: self.chunk_size,
            next_read: region.base,
            region_end: region.end(),
            buffer: Vec::new(),
            buffer_base: region.base,
            cursor: 0,
            scanned: 0,
            done: false,
        }
    }

    /// First match, or `PatternNotFound`
    pub fn find_first(&self, pattern: &MemoryPattern, region: &MemoryRegion) -> Result<u64> {
        match self.scan(pattern, region).next() {
            Some(result) => result,
            None => Err(Error::PatternNotFound(pattern.to_string())),
        }
    }

    /// Every match; an empty vector when nothing matches
    pub fn find_all(&self, pattern: &MemoryPattern, region: &MemoryRegion) -> Result<Vec<u64>> {
        self.scan(pattern, region).collect()
    }
}

/// Single-pass match iterator returned by [`Scanner::scan`].
///
/// The buffer holds the unscanned tail of the previous chunk followed by the
/// newest chunk, so a window that straddles chunk boundaries is seen whole.
pub struct Matches<'a, 'p, R: ReadMemory + ?Sized> {
    reader: &'a R,
    pattern: &'p MemoryPattern,
    chunk_size: usize,
    next_read: u64,
    region_end: u64,
    buffer: Vec<u8>,
    buffer_base: u64,
    /// First window start in `buffer` not yet examined
    cursor: usize,
    scanned: usize,
    done: bool,
}

impl<R: ReadMemory + ?Sized> Matches<'_, '_, R> {
    fn next_in_buffer(&mut self) -> Option<usize> {
        let len = self.pattern.len();
        if self.buffer.len() < len || self.cursor > self.buffer.len() - len {
            return None;
        }

        let last = self.buffer.len() - len;
        let (first_index, first_byte) = self.pattern.first_fixed();
        let haystack = &self.buffer[self.cursor + first_index..=last + first_index];

        for hit in memchr::memchr_iter(first_byte, haystack) {
            let start = self.cursor + hit;
            if self.pattern.matches_at(&self.buffer, start) {
                self.cursor = start + 1;
                return Some(start);
            }
        }

        self.cursor = last + 1;
        None
    }

    fn refill(&mut self) -> Option<Result<()>> {
        if self.next_read >= self.region_end {
            return None;
        }

        let remaining = (self.region_end - self.next_read) as usize;
        let read_size = remaining.min(self.chunk_size);

        match self.reader.read_bytes(self.next_read, read_size) {
            Ok(chunk) => {
                // Keep only window starts that could not be checked yet
                let keep_from = self.cursor.min(self.buffer.len());
                self.buffer.drain(..keep_from);
                self.buffer_base += keep_from as u64;
                self.cursor = 0;
                self.buffer.extend_from_slice(&chunk);

                self.next_read += read_size as u64;
                self.scanned += read_size;
                Some(Ok(()))
            }
            Err(e) if self.scanned == 0 => Some(Err(e)),
            Err(e) => {
                debug!(
                    "Scan stopped at {:#x} (scanned {:#x} bytes): {}",
                    self.next_read, self.scanned, e
                );
                None
            }
        }
    }
}

impl<R: ReadMemory + ?Sized> Iterator for Matches<'_, '_, R> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(start) = self.next_in_buffer() {
                let address = self.buffer_base + start as u64 + self.pattern.anchor() as u64;
                return Some(Ok(address));
            }

            if self.done {
                return None;
            }

            match self.refill() {
                Some(Ok(())) => continue,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

impl<R: ReadMemory + ?Sized> std::iter::FusedIterator for Matches<'_, '_, R> {}
