use serde::{Deserialize, Serialize};

/// A contiguous span of the foreign address space, usually one loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub base: u64,
    pub size: usize,
    #[serde(default)]
    pub name: Option<String>,
}

impl MemoryRegion {
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            size,
            name: None,
        }
    }

    pub fn named<S: Into<String>>(base: u64, size: usize, name: S) -> Self {
        Self {
            base,
            size,
            name: Some(name.into()),
        }
    }

    /// One past the last address of the region (saturating).
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size as u64)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }

    /// Check the region's module name, ignoring case and any directory part
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref().is_some_and(|own| {
            let file = own.rsplit(['/', '\\']).next().unwrap_or(own);
            file.eq_ignore_ascii_case(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bounds() {
        let region = MemoryRegion::new(0x1000, 0x1000);
        assert_eq!(region.end(), 0x2000);
        assert!(region.contains(0x1000));
        assert!(region.contains(0x1FFF));
        assert!(!region.contains(0x2000));
        assert!(!region.contains(0xFFF));
    }

    #[test]
    fn test_region_end_saturates() {
        let region = MemoryRegion::new(u64::MAX - 4, 16);
        assert_eq!(region.end(), u64::MAX);
    }

    #[test]
    fn test_region_is_named() {
        let region = MemoryRegion::named(0x140000000, 0x1000, r"C:\Games\PathOfExile.exe");
        assert!(region.is_named("pathofexile.exe"));
        assert!(!region.is_named("kernel32.dll"));

        let linux = MemoryRegion::named(0x400000, 0x1000, "/usr/bin/target-app");
        assert!(linux.is_named("target-app"));

        assert!(!MemoryRegion::new(0, 1).is_named("anything"));
    }
}
