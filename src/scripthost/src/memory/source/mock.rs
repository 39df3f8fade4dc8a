//! Mock Memory Source
//!
//! A byte buffer presented at a virtual base address. Used to build
//! synthetic module images and pool tables for scanning and pool tests.

use super::traits::unreadable;
use super::{MemoryRegion, MemorySource};
use crate::Result;
use byteorder::{ByteOrder, LE};

/// A mock memory source backed by a contiguous buffer
pub struct MockMemorySource {
    /// Raw memory data (contiguous, starting at base_address)
    pub data: Vec<u8>,
    /// Base virtual address for the data
    pub base_address: usize,
    /// Memory regions (for region-based operations)
    pub regions: Vec<MemoryRegion>,
}

impl MockMemorySource {
    /// Create a new readable/writable mock with data at given base address
    pub fn new(data: Vec<u8>, base_address: usize) -> Self {
        let end = base_address + data.len();
        Self {
            data,
            base_address,
            regions: vec![MemoryRegion::new(base_address, end, "rw-p")],
        }
    }

    /// Create a zero-filled mock of `size` bytes
    pub fn zeroed(size: usize, base_address: usize) -> Self {
        Self::new(vec![0; size], base_address)
    }

    /// Create with explicit regions
    pub fn with_regions(data: Vec<u8>, base_address: usize, regions: Vec<MemoryRegion>) -> Self {
        Self {
            data,
            base_address,
            regions,
        }
    }

    /// Create a mock with an executable image region (for signature tests)
    pub fn with_code_region(data: Vec<u8>, base_address: usize) -> Self {
        let end = base_address + data.len();
        Self {
            data,
            base_address,
            regions: vec![MemoryRegion::new(base_address, end, "r-xp").with_path("host.exe")],
        }
    }

    fn offset_of(&self, address: usize, size: usize) -> Option<usize> {
        let offset = address.checked_sub(self.base_address)?;
        (offset.checked_add(size)? <= self.data.len()).then_some(offset)
    }

    /// Write raw bytes at a virtual address; panics when out of range
    pub fn put_bytes(&mut self, address: usize, bytes: &[u8]) {
        let offset = self
            .offset_of(address, bytes.len())
            .unwrap_or_else(|| panic!("mock write at {:#x} out of range", address));
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn put_u8(&mut self, address: usize, value: u8) {
        self.put_bytes(address, &[value]);
    }

    pub fn put_u32(&mut self, address: usize, value: u32) {
        let mut buf = [0u8; 4];
        LE::write_u32(&mut buf, value);
        self.put_bytes(address, &buf);
    }

    pub fn put_u64(&mut self, address: usize, value: u64) {
        let mut buf = [0u8; 8];
        LE::write_u64(&mut buf, value);
        self.put_bytes(address, &buf);
    }

    pub fn put_f32(&mut self, address: usize, value: f32) {
        let mut buf = [0u8; 4];
        LE::write_f32(&mut buf, value);
        self.put_bytes(address, &buf);
    }
}

impl MemorySource for MockMemorySource {
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>> {
        let readable = self
            .regions
            .iter()
            .any(|r| r.is_readable() && r.contains_range(address, size));
        match self.offset_of(address, size) {
            Some(offset) if readable => Ok(self.data[offset..offset + size].to_vec()),
            _ => Err(unreadable(address, size)),
        }
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_read_bytes() {
        let source = MockMemorySource::new(vec![0x41, 0x42, 0x43, 0x44], 0x1000);

        assert_eq!(source.read_bytes(0x1000, 4).unwrap(), b"ABCD");
        assert_eq!(source.read_bytes(0x1001, 2).unwrap(), b"BC");
    }

    #[test]
    fn test_mock_source_typed_reads() {
        let mut source = MockMemorySource::zeroed(0x40, 0x1000);
        source.put_u64(0x1000, 0x0807060504030201);
        source.put_u32(0x1008, 0xdeadbeef);
        source.put_f32(0x100c, 1.5);
        source.put_u8(0x1010, 0x7f);

        assert_eq!(source.read_u64(0x1000).unwrap(), 0x0807060504030201);
        assert_eq!(source.read_ptr(0x1000).unwrap(), 0x0807060504030201);
        assert_eq!(source.read_u32(0x1008).unwrap(), 0xdeadbeef);
        assert_eq!(source.read_i32(0x1008).unwrap(), 0xdeadbeefu32 as i32);
        assert_eq!(source.read_f32(0x100c).unwrap(), 1.5);
        assert_eq!(source.read_u8(0x1010).unwrap(), 0x7f);
    }

    #[test]
    fn test_mock_source_read_cstring() {
        let source = MockMemorySource::new(b"Hello\0World\0padding".to_vec(), 0x1000);

        assert_eq!(source.read_cstring(0x1000, 10).unwrap(), "Hello");
        assert_eq!(source.read_cstring(0x1006, 10).unwrap(), "World");
    }

    #[test]
    fn test_mock_source_read_out_of_bounds() {
        let source = MockMemorySource::new(vec![0x41, 0x42, 0x43, 0x44], 0x1000);

        assert!(source.read_bytes(0x1002, 10).is_err());
        assert!(source.read_bytes(0x500, 4).is_err());
    }

    #[test]
    fn test_mock_source_respects_unreadable_regions() {
        let source = MockMemorySource::with_regions(
            vec![0; 0x2000],
            0x1000,
            vec![
                MemoryRegion::new(0x1000, 0x2000, "r--p"),
                MemoryRegion::new(0x2000, 0x3000, "-w-p"),
            ],
        );

        assert!(source.read_bytes(0x1800, 8).is_ok());
        assert!(source.read_bytes(0x2800, 8).is_err());
        assert!(source.is_readable(0x1500));
        assert!(!source.is_readable(0x2500));
        assert!(!source.is_readable(0x5000));
    }

    #[test]
    fn test_code_region_is_executable() {
        let source = MockMemorySource::with_code_region(vec![0x90; 16], 0x140000000);
        let region = source.find_region(0x140000004).unwrap();
        assert!(region.is_executable());
        assert!(!source.is_live());
    }
}
