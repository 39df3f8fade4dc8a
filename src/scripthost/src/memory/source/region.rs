//! Memory Region Types
//!
//! A mapped range of the address space and its access rights.

/// A mapped memory region (one line of /proc/self/maps, or a synthetic range)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: usize,
    pub end: usize,
    pub perms: String,
    pub offset: usize,
    pub path: Option<String>,
}

impl MemoryRegion {
    /// Create an anonymous region with the given permission string
    pub fn new(start: usize, end: usize, perms: &str) -> Self {
        Self {
            start,
            end,
            perms: perms.to_string(),
            offset: 0,
            path: None,
        }
    }

    /// Attach a backing path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn size(&self) -> usize {
        self.end - self.start
    }

    /// Whether `[address, address + len)` lies entirely inside this region
    pub fn contains_range(&self, address: usize, len: usize) -> bool {
        address >= self.start
            && address
                .checked_add(len)
                .map(|end| end <= self.end)
                .unwrap_or(false)
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_writable(&self) -> bool {
        self.perms.chars().nth(1) == Some('w')
    }

    pub fn is_executable(&self) -> bool {
        self.perms.chars().nth(2) == Some('x')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_size_and_perms() {
        let region = MemoryRegion::new(0x1000, 0x3000, "r-xp");
        assert_eq!(region.size(), 0x2000);
        assert!(region.is_readable());
        assert!(!region.is_writable());
        assert!(region.is_executable());

        let data = MemoryRegion::new(0, 0x1000, "-w-p");
        assert!(!data.is_readable());
        assert!(data.is_writable());
    }

    #[test]
    fn test_contains_range() {
        let region = MemoryRegion::new(0x1000, 0x2000, "r--p");
        assert!(region.contains_range(0x1000, 0x1000));
        assert!(region.contains_range(0x1ff8, 8));
        assert!(!region.contains_range(0x1ff9, 8));
        assert!(!region.contains_range(0x0fff, 1));
        assert!(!region.contains_range(usize::MAX - 1, 8));
    }

    #[test]
    fn test_with_path() {
        let region = MemoryRegion::new(0, 0x10, "r--p").with_path("/usr/bin/host");
        assert_eq!(region.path.as_deref(), Some("/usr/bin/host"));
    }
}
