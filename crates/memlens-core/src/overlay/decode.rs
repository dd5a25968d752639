use std::sync::Arc;

use encoding_rs::{SHIFT_JIS, UTF_8, UTF_16LE};

use super::{Record, Value};
use crate::error::{Error, Result};
use crate::memory::ReadMemory;
use crate::schema::{DecodeKind, StructSchema, TextEncoding};

/// Read the schema's whole span at `base` once and decode every field from it
pub fn decode<R: ReadMemory + ?Sized>(
    reader: &R,
    schema: &Arc<StructSchema>,
    base: u64,
) -> Result<Record> {
    let bytes = reader.read_bytes(base, schema.span())?;
    decode_bytes(schema, base, &bytes)
}

/// Decode a record from bytes already read at `base`
pub fn decode_bytes(schema: &Arc<StructSchema>, base: u64, bytes: &[u8]) -> Result<Record> {
    let span = schema.span();
    if bytes.len() < span {
        return Err(Error::PartialRead {
            address: base,
            expected: span,
            actual: bytes.len(),
        });
    }

    let values = schema
        .fields
        .iter()
        .map(|field| decode_value(field.kind, &bytes[field.offset..field.offset + field.size]))
        .collect();

    Ok(Record::new(Arc::clone(schema), base, values))
}

/// Decode one field; `raw` is exactly `kind.width()` bytes long
pub fn decode_value(kind: DecodeKind, raw: &[u8]) -> Value {
    match kind {
        DecodeKind::U8 => Value::U8(raw[0]),
        DecodeKind::I8 => Value::I8(raw[0] as i8),
        DecodeKind::U16 => Value::U16(u16::from_le_bytes(array(raw))),
        DecodeKind::I16 => Value::I16(i16::from_le_bytes(array(raw))),
        DecodeKind::U32 => Value::U32(u32::from_le_bytes(array(raw))),
        DecodeKind::I32 => Value::I32(i32::from_le_bytes(array(raw))),
        DecodeKind::F32 => Value::F32(f32::from_le_bytes(array(raw))),
        DecodeKind::U64 => Value::U64(u64::from_le_bytes(array(raw))),
        DecodeKind::I64 => Value::I64(i64::from_le_bytes(array(raw))),
        DecodeKind::F64 => Value::F64(f64::from_le_bytes(array(raw))),
        DecodeKind::Address => Value::Address(u64::from_le_bytes(array(raw))),
        DecodeKind::Bytes { .. } => Value::Bytes(raw.to_vec()),
        DecodeKind::Text { encoding, .. } => Value::Text(decode_text(raw, encoding)),
    }
}

fn array<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[..N]);
    out
}

/// Decode text up to the first NUL (a zero code unit for UTF-16)
pub fn decode_text(raw: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => {
            let len = memchr::memchr(0, raw).unwrap_or(raw.len());
            let (text, _) = UTF_8.decode_without_bom_handling(&raw[..len]);
            text.into_owned()
        }
        TextEncoding::ShiftJis => {
            let len = memchr::memchr(0, raw).unwrap_or(raw.len());
            let (text, _) = SHIFT_JIS.decode_without_bom_handling(&raw[..len]);
            text.into_owned()
        }
        TextEncoding::Utf16Le => {
            let len = raw
                .chunks_exact(2)
                .position(|unit| unit == [0, 0])
                .map(|units| units * 2)
                .unwrap_or(raw.len() & !1);
            let (text, _) = UTF_16LE.decode_without_bom_handling(&raw[..len]);
            text.into_owned()
        }
    }
}
