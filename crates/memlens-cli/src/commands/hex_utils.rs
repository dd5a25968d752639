//! Address parsing and formatting.

use anyhow::{Context, Result};

/// Parse a hex address, with or without `0x`, optionally `base+offset`.
///
/// ```ignore
/// assert_eq!(parse_address("0x1000").unwrap(), 0x1000);
/// assert_eq!(parse_address("7FF6_1000+0x30").unwrap(), 0x7FF6_1030);
/// ```
pub fn parse_address(s: &str) -> Result<u64> {
    s.split('+').try_fold(0u64, |sum, part| {
        let value = parse_hex(part)?;
        sum.checked_add(value)
            .with_context(|| format!("Address overflow in '{}'", s))
    })
}

fn parse_hex(part: &str) -> Result<u64> {
    let trimmed = part.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .replace('_', "");
    u64::from_str_radix(&digits, 16).with_context(|| format!("Invalid hex address '{}'", part))
}

pub fn format_address(address: u64) -> String {
    format!("0x{:X}", address)
}
