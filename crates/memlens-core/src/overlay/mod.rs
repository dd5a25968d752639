//! Typed overlay reader: one bulk read per structure, decoded in a single pass

mod decode;
mod value;

pub use decode::{decode, decode_bytes, decode_text, decode_value};
pub use value::{Record, Value};
