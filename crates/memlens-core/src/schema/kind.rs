use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Text encodings supported by `DecodeKind::Text`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TextEncoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    #[serde(alias = "utf-16le")]
    Utf16Le,
    #[serde(alias = "shift-jis", alias = "sjis")]
    ShiftJis,
}

/// How the bytes of one field are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecodeKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Opaque 64-bit pointer, never followed implicitly
    Address,
    Bytes {
        len: usize,
    },
    Text {
        len: usize,
        #[serde(default)]
        encoding: TextEncoding,
    },
}

impl DecodeKind {
    /// Number of bytes this kind occupies
    pub fn width(&self) -> usize {
        match self {
            DecodeKind::U8 | DecodeKind::I8 => 1,
            DecodeKind::U16 | DecodeKind::I16 => 2,
            DecodeKind::U32 | DecodeKind::I32 | DecodeKind::F32 => 4,
            DecodeKind::U64 | DecodeKind::I64 | DecodeKind::F64 | DecodeKind::Address => 8,
            DecodeKind::Bytes { len } | DecodeKind::Text { len, .. } => *len,
        }
    }

    pub fn name(&self) -> String {
        match self {
            DecodeKind::U8 => "u8".to_string(),
            DecodeKind::U16 => "u16".to_string(),
            DecodeKind::U32 => "u32".to_string(),
            DecodeKind::U64 => "u64".to_string(),
            DecodeKind::I8 => "i8".to_string(),
            DecodeKind::I16 => "i16".to_string(),
            DecodeKind::I32 => "i32".to_string(),
            DecodeKind::I64 => "i64".to_string(),
            DecodeKind::F32 => "f32".to_string(),
            DecodeKind::F64 => "f64".to_string(),
            DecodeKind::Address => "address".to_string(),
            DecodeKind::Bytes { len } => format!("bytes({})", len),
            DecodeKind::Text { len, encoding } => format!("text({}, {})", len, encoding),
        }
    }
}
