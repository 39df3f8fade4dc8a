//! In-Process Memory Source
//!
//! Reads the address space of the process this library is loaded into.
//! Reads are only performed inside regions reported as readable, so a stale
//! pointer produces an error instead of a fault.

use super::traits::unreadable;
use super::{MemoryRegion, MemorySource};
use crate::Result;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// The current process's own memory
pub struct LocalProcess {
    maps: Vec<MemoryRegion>,
}

impl LocalProcess {
    /// Snapshot the memory map of the current process
    pub fn current() -> Result<Self> {
        let maps = parse_maps(Path::new("/proc/self/maps"))?;
        Ok(Self { maps })
    }

    /// Use an explicit region list (platforms without /proc, or tests)
    pub fn with_regions(maps: Vec<MemoryRegion>) -> Self {
        Self { maps }
    }

    /// Re-read the memory map after modules were loaded or unloaded
    pub fn refresh(&mut self) -> Result<()> {
        self.maps = parse_maps(Path::new("/proc/self/maps"))?;
        Ok(())
    }
}

impl MemorySource for LocalProcess {
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>> {
        let readable = self
            .maps
            .iter()
            .any(|r| r.is_readable() && r.contains_range(address, size));
        if !readable {
            return Err(unreadable(address, size));
        }

        let mut buffer = vec![0u8; size];
        // SAFETY: the whole range lies inside a mapping reported readable for this process.
        unsafe {
            std::ptr::copy_nonoverlapping(address as *const u8, buffer.as_mut_ptr(), size);
        }
        Ok(buffer)
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.maps
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// Parse a /proc/<pid>/maps file into memory regions
pub fn parse_maps(path: &Path) -> Result<Vec<MemoryRegion>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut regions = Vec::new();

    for line in reader.lines() {
        if let Some(region) = parse_maps_line(&line?) {
            regions.push(region);
        }
    }

    Ok(regions)
}

fn parse_maps_line(line: &str) -> Option<MemoryRegion> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (start, end) = parts.first()?.split_once('-')?;

    let start = usize::from_str_radix(start, 16).ok()?;
    let end = usize::from_str_radix(end, 16).ok()?;
    let perms = parts.get(1).unwrap_or(&"").to_string();
    let offset = parts
        .get(2)
        .and_then(|s| usize::from_str_radix(s, 16).ok())
        .unwrap_or(0);
    let path = parts.get(5).map(|s| s.to_string());

    Some(MemoryRegion {
        start,
        end,
        perms,
        offset,
        path,
    })
}
