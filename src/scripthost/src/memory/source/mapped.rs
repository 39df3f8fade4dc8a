//! Mapped File Source
//!
//! A module image on disk (an unpacked executable or a raw dump of the
//! image range) memory-mapped and presented at its runtime base address,
//! so signatures can be checked offline against a new host build.

use super::traits::unreadable;
use super::{MemoryRegion, MemorySource};
use crate::Result;

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A memory-mapped file presented at a virtual base address
pub struct MappedFile {
    mmap: Mmap,
    base_address: usize,
    regions: Vec<MemoryRegion>,
}

impl MappedFile {
    /// Map `path` read-only at `base_address`
    pub fn open(path: &Path, base_address: usize) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only; the file is not expected to change while mapped.
        let mmap = unsafe { Mmap::map(&file)? };
        let end = base_address + mmap.len();
        let region = MemoryRegion::new(base_address, end, "r-xp")
            .with_path(path.display().to_string());

        Ok(Self {
            mmap,
            base_address,
            regions: vec![region],
        })
    }

    pub fn base_address(&self) -> usize {
        self.base_address
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl MemorySource for MappedFile {
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>> {
        let offset = address
            .checked_sub(self.base_address)
            .filter(|offset| offset.checked_add(size).is_some_and(|end| end <= self.mmap.len()))
            .ok_or_else(|| unreadable(address, size))?;
        Ok(self.mmap[offset..offset + size].to_vec())
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_live(&self) -> bool {
        false
    }
}
