use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const ANCHOR_MARKER: &str = "^";

/// Compiled byte pattern with wildcards and an anchor position.
///
/// Text form: space separated hex bytes, `??` or `?` for a wildcard and at
/// most one `^`. The `^` is a position marker, not a byte: the anchor is the
/// number of byte tokens in front of it and may equal the pattern length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryPattern {
    tokens: Vec<Option<u8>>,
    anchor: usize,
    first_fixed: usize,
}

impl MemoryPattern {
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut anchor = None;

        for token in text.split_whitespace() {
            if token == ANCHOR_MARKER {
                if anchor.is_some() {
                    return Err(Error::InvalidPattern(format!(
                        "More than one anchor marker in '{}'",
                        text
                    )));
                }
                anchor = Some(tokens.len());
                continue;
            }

            if token == "??" || token == "?" {
                tokens.push(None);
                continue;
            }

            if token.len() != 2 {
                return Err(Error::InvalidPattern(format!(
                    "Token '{}' is not a two-digit hex byte",
                    token
                )));
            }
            let value = u8::from_str_radix(token, 16).map_err(|e| {
                Error::InvalidPattern(format!("Invalid pattern token '{}': {}", token, e))
            })?;
            tokens.push(Some(value));
        }

        Self::from_tokens(tokens, anchor.unwrap_or(0))
    }

    pub fn from_tokens(tokens: Vec<Option<u8>>, anchor: usize) -> Result<Self> {
        if tokens.is_empty() {
            return Err(Error::InvalidPattern("Pattern is empty".to_string()));
        }
        if anchor > tokens.len() {
            return Err(Error::InvalidPattern(format!(
                "Anchor {} is past the end of a {}-byte pattern",
                anchor,
                tokens.len()
            )));
        }
        let first_fixed = tokens.iter().position(Option::is_some).ok_or_else(|| {
            Error::InvalidPattern("Pattern has no fixed bytes".to_string())
        })?;

        Ok(Self {
            tokens,
            anchor,
            first_fixed,
        })
    }

    pub fn tokens(&self) -> &[Option<u8>] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Offset of the anchor from the start of a match
    pub fn anchor(&self) -> usize {
        self.anchor
    }

    /// Index and value of the first non-wildcard token
    pub(crate) fn first_fixed(&self) -> (usize, u8) {
        // Construction guarantees a fixed byte exists at this index
        (self.first_fixed, self.tokens[self.first_fixed].unwrap_or_default())
    }

    /// Whether the window starting at `start` matches
    pub fn matches_at(&self, buffer: &[u8], start: usize) -> bool {
        let Some(window) = buffer.get(start..start + self.tokens.len()) else {
            return false;
        };
        self.tokens
            .iter()
            .zip(window)
            .all(|(token, byte)| token.is_none_or(|value| value == *byte))
    }
}

impl FromStr for MemoryPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MemoryPattern {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MemoryPattern> for String {
    fn from(value: MemoryPattern) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MemoryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .tokens
            .iter()
            .map(|token| match token {
                Some(value) => format!("{:02X}", value),
                None => "??".to_string(),
            })
            .collect();
        if self.anchor != 0 {
            parts.insert(self.anchor, ANCHOR_MARKER.to_string());
        }
        f.write_str(&parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_wildcards_and_anchor() {
        let pattern = MemoryPattern::parse("4C ?? ?? ^ ?? ?? ?? ?? 8B").unwrap();
        assert_eq!(pattern.len(), 8);
        assert_eq!(pattern.anchor(), 3);
        assert_eq!(pattern.tokens()[0], Some(0x4C));
        assert_eq!(pattern.tokens()[1], None);
        assert_eq!(pattern.tokens()[7], Some(0x8B));
    }

    #[test]
    fn test_anchor_at_end() {
        let pattern = MemoryPattern::parse("E8 ?? ?? ?? ?? E8 ?? ?? ?? ?? FF 05 ^").unwrap();
        assert_eq!(pattern.len(), 12);
        assert_eq!(pattern.anchor(), 12);
    }

    #[test]
    fn test_default_anchor_is_match_start() {
        let pattern = MemoryPattern::parse("48 8D 0D ? ? ? ?").unwrap();
        assert_eq!(pattern.anchor(), 0);
        assert_eq!(pattern.len(), 7);
    }

    #[test]
    fn test_leading_wildcards_first_fixed() {
        let pattern = MemoryPattern::parse("?? ?? AB").unwrap();
        assert_eq!(pattern.first_fixed(), (2, 0xAB));
    }

    #[test]
    fn test_rejects_malformed_patterns() {
        for text in ["", "   ", "?? ??", "^", "AB ^ CD ^", "GG", "ABC", "A"] {
            assert!(
                matches!(MemoryPattern::parse(text), Err(Error::InvalidPattern(_))),
                "accepted '{}'",
                text
            );
        }
        assert!(MemoryPattern::from_tokens(vec![Some(1)], 2).is_err());
    }

    #[test]
    fn test_display_keeps_anchor() {
        let text = "4C ?? ?? ^ ?? 8B";
        let pattern: MemoryPattern = text.parse().unwrap();
        assert_eq!(pattern.to_string(), text);

        let lower: MemoryPattern = "ff 05 ^".parse().unwrap();
        assert_eq!(lower.to_string(), "FF 05 ^");
    }

    #[test]
    fn test_matches_at() {
        let pattern = MemoryPattern::parse("AB ?? CD").unwrap();
        let buffer = [0x00, 0xAB, 0x11, 0xCD, 0xAB];
        assert!(pattern.matches_at(&buffer, 1));
        assert!(!pattern.matches_at(&buffer, 0));
        assert!(!pattern.matches_at(&buffer, 4));
    }
}
