//! Live process attachment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::ProcessHandle;

#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "windows")]
pub use win32::ProcessHandle;

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
mod unsupported;
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub use unsupported::ProcessHandle;

/// How to pick the foreign process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProcessSelector {
    Pid(u32),
    /// Executable name, matched case-insensitively with or without `.exe`
    Name(String),
}

impl ProcessSelector {
    /// Compare a candidate executable name against this selector
    pub fn matches_name(&self, candidate: &str) -> bool {
        let ProcessSelector::Name(wanted) = self else {
            return false;
        };
        let file = candidate.rsplit(['/', '\\']).next().unwrap_or(candidate);
        let strip = |s: &str| {
            let lower = s.to_ascii_lowercase();
            match lower.strip_suffix(".exe") {
                Some(stem) => stem.to_string(),
                None => lower,
            }
        };
        !wanted.is_empty() && strip(file) == strip(wanted)
    }
}

impl FromStr for ProcessSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ProcessNotFound("empty process selector".to_string()));
        }
        if let Some(pid) = s.strip_prefix("pid:") {
            return pid
                .trim()
                .parse()
                .map(ProcessSelector::Pid)
                .map_err(|e| Error::ProcessNotFound(format!("Invalid pid '{}': {}", pid, e)));
        }
        match s.parse::<u32>() {
            Ok(pid) => Ok(ProcessSelector::Pid(pid)),
            Err(_) => Ok(ProcessSelector::Name(s.to_string())),
        }
    }
}

impl TryFrom<String> for ProcessSelector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ProcessSelector> for String {
    fn from(value: ProcessSelector) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ProcessSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessSelector::Pid(pid) => write!(f, "pid:{}", pid),
            ProcessSelector::Name(name) => f.write_str(name),
        }
    }
}

impl ProcessHandle {
    /// Open the process a selector points at
    pub fn open_selected(selector: &ProcessSelector) -> Result<Self> {
        match selector {
            ProcessSelector::Pid(pid) => Self::open(*pid),
            ProcessSelector::Name(_) => {
                let pid = Self::find(selector)?;
                Self::open(pid)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parse() {
        assert_eq!(
            "1234".parse::<ProcessSelector>().unwrap(),
            ProcessSelector::Pid(1234)
        );
        assert_eq!(
            "pid: 77".parse::<ProcessSelector>().unwrap(),
            ProcessSelector::Pid(77)
        );
        assert_eq!(
            "PathOfExile.exe".parse::<ProcessSelector>().unwrap(),
            ProcessSelector::Name("PathOfExile.exe".to_string())
        );
        assert!("".parse::<ProcessSelector>().is_err());
        assert!("pid:abc".parse::<ProcessSelector>().is_err());
    }

    #[test]
    fn test_selector_matches_name() {
        let selector = ProcessSelector::Name("PathOfExile.exe".to_string());
        assert!(selector.matches_name("pathofexile.exe"));
        assert!(selector.matches_name(r"C:\Games\PathOfExile.exe"));
        assert!(selector.matches_name("PathOfExile"));
        assert!(!selector.matches_name("PathOfExile_x64.exe"));
        assert!(!ProcessSelector::Pid(1).matches_name("PathOfExile.exe"));
    }

    #[test]
    fn test_selector_serde_as_string() {
        let json = serde_json::to_string(&ProcessSelector::Pid(12)).unwrap();
        assert_eq!(json, "\"pid:12\"");
        let parsed: ProcessSelector = serde_json::from_str("\"game.exe\"").unwrap();
        assert_eq!(parsed, ProcessSelector::Name("game.exe".to_string()));
    }
}
