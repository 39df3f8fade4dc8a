//! Host module image bounds

use super::source::{MemoryRegion, MemorySource};
use crate::{Error, Result};

/// Base address and size of the host's main executable image.
///
/// Immutable once located; the pattern scanner reads exactly this range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleImage {
    pub base: usize,
    pub size: usize,
}

impl ModuleImage {
    pub fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    pub fn from_region(region: &MemoryRegion) -> Self {
        Self::new(region.start, region.size())
    }

    /// Span every mapping backed by `path` (the image is usually mapped as
    /// several consecutive segments with different permissions)
    pub fn for_path(source: &dyn MemorySource, path: &str) -> Result<Self> {
        let mut mappings = source
            .regions()
            .iter()
            .filter(|r| r.path.as_deref() == Some(path));

        let first = mappings
            .next()
            .ok_or_else(|| Error::Memory(format!("No mapping for module {}", path)))?;
        let (start, end) = mappings.fold((first.start, first.end), |(start, end), r| {
            (start.min(r.start), end.max(r.end))
        });

        Ok(Self::new(start, end - start))
    }

    /// Locate the main executable of the current process
    pub fn main_module(source: &dyn MemorySource) -> Result<Self> {
        let exe = std::env::current_exe()?;
        Self::for_path(source, &exe.display().to_string())
    }

    pub fn end(&self) -> usize {
        self.base + self.size
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.base && address < self.end()
    }
}
