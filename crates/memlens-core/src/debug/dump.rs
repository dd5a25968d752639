use serde::Serialize;

use crate::error::Result;
use crate::memory::ReadMemory;

const BYTES_PER_LINE: usize = 16;

/// Bytes copied from one address, rendered as hexdump lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryDump {
    pub address: u64,
    pub bytes: Vec<u8>,
}

impl MemoryDump {
    pub fn read<R: ReadMemory + ?Sized>(reader: &R, address: u64, size: usize) -> Result<Self> {
        Ok(Self {
            address,
            bytes: reader.read_bytes(address, size)?,
        })
    }

    /// `0x000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|`
    ///
    /// Offsets are relative to `address`; the ASCII column is optional.
    pub fn lines(&self, ascii: bool) -> Vec<String> {
        self.bytes
            .chunks(BYTES_PER_LINE)
            .enumerate()
            .map(|(i, chunk)| format_line(i * BYTES_PER_LINE, chunk, ascii))
            .collect()
    }
}

fn format_line(offset: usize, chunk: &[u8], ascii: bool) -> String {
    let mut line = format!("0x{:03X}: ", offset);

    for j in 0..BYTES_PER_LINE {
        if j == BYTES_PER_LINE / 2 {
            line.push(' ');
        }
        match chunk.get(j) {
            Some(byte) => line.push_str(&format!("{:02X} ", byte)),
            None => line.push_str("   "),
        }
    }

    if ascii {
        line.push_str(" |");
        for j in 0..BYTES_PER_LINE {
            line.push(match chunk.get(j) {
                Some(byte) if (0x20..0x7F).contains(byte) => *byte as char,
                Some(_) => '.',
                None => ' ',
            });
        }
        line.push('|');
    }

    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryReader, MockMemoryBuilder};

    #[test]
    fn test_dump_lines() {
        let mut bytes = b"Hello World".to_vec();
        bytes.resize(20, 0);
        let dump = MemoryDump {
            address: 0x1000,
            bytes,
        };

        let lines = dump.lines(true);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0x000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|"
        );
        assert!(lines[1].starts_with("0x010: 00 00 00 00"));
        assert!(lines[1].ends_with("|....            |"));

        assert_eq!(
            dump.lines(false)[1],
            "0x010: 00 00 00 00"
        );
    }

    #[test]
    fn test_dump_read() {
        let mock = MockMemoryBuilder::new()
            .segment(0x2000, vec![0xAA, 0xBB, 0xCC])
            .build();
        let reader = MemoryReader::new(mock);

        let dump = MemoryDump::read(&reader, 0x2001, 2).unwrap();
        assert_eq!(dump.bytes, vec![0xBB, 0xCC]);
        assert!(MemoryDump::read(&reader, 0x2001, 8).is_err());
    }
}
