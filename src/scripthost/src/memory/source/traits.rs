//! Memory Source Trait
//!
//! Core abstraction for reading memory from various sources.

use super::MemoryRegion;
use crate::{Error, Result};
use byteorder::{ByteOrder, LE};

/// Trait for reading memory from various sources (own process, mapped file, mock)
pub trait MemorySource: Send + Sync {
    /// Read bytes from a virtual address
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>>;

    /// Get the list of memory regions
    fn regions(&self) -> &[MemoryRegion];

    /// Check if this is live memory that may change between reads
    fn is_live(&self) -> bool;

    fn read_u8(&self, address: usize) -> Result<u8> {
        let bytes = self.read_bytes(address, 1)?;
        Ok(bytes[0])
    }

    fn read_u32(&self, address: usize) -> Result<u32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(LE::read_u32(&bytes))
    }

    fn read_i32(&self, address: usize) -> Result<i32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(LE::read_i32(&bytes))
    }

    fn read_u64(&self, address: usize) -> Result<u64> {
        let bytes = self.read_bytes(address, 8)?;
        Ok(LE::read_u64(&bytes))
    }

    fn read_f32(&self, address: usize) -> Result<f32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(LE::read_f32(&bytes))
    }

    /// Read a pointer (usize) from memory
    fn read_ptr(&self, address: usize) -> Result<usize> {
        let bytes = self.read_bytes(address, 8)?;
        Ok(LE::read_u64(&bytes) as usize)
    }

    /// Read a null-terminated string from memory
    fn read_cstring(&self, address: usize, max_len: usize) -> Result<String> {
        let bytes = self.read_bytes(address, max_len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).to_string())
    }

    /// Find a region containing the given address
    fn find_region(&self, address: usize) -> Option<&MemoryRegion> {
        self.regions()
            .iter()
            .find(|r| address >= r.start && address < r.end)
    }

    /// Check if an address is readable
    fn is_readable(&self, address: usize) -> bool {
        self.find_region(address)
            .map(|r| r.is_readable())
            .unwrap_or(false)
    }
}

/// Error for a read that falls outside every readable region
pub(crate) fn unreadable(address: usize, size: usize) -> Error {
    Error::Memory(format!(
        "{} bytes at {:#x} are not inside a readable region",
        size, address
    ))
}
