//! Label Text
//!
//! The host keeps localized UI strings in a table of `(hash, text)` entries
//! sorted by the Jenkins one-at-a-time hash of the label name.

use super::layout;
use super::signature::{self, ResolvedAddresses};
use super::source::MemorySource;
use crate::Result;

use std::sync::Arc;

/// Longest label text read before giving up on a terminator
const MAX_LABEL_LEN: usize = 0x400;

/// Jenkins one-at-a-time hash over lowercased bytes, as the host hashes
/// model and label names
pub fn joaat(text: &str) -> u32 {
    let mut hash: u32 = 0;
    for byte in text.bytes().map(|b| b.to_ascii_lowercase()) {
        hash = hash.wrapping_add(byte as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// Read access to the host's label table
pub struct LabelTable {
    source: Arc<dyn MemorySource>,
    table: usize,
}

impl LabelTable {
    /// `table` is the address of the table header itself
    pub fn new(source: Arc<dyn MemorySource>, table: usize) -> Self {
        Self { source, table }
    }

    pub fn from_addresses(
        source: Arc<dyn MemorySource>,
        addresses: &ResolvedAddresses,
    ) -> Result<Self> {
        Ok(Self::new(source, addresses.get(signature::STRING_LABEL_TABLE)?))
    }

    pub fn len(&self) -> usize {
        self.source
            .read_u32(layout::label_table_count_address(self.table))
            .map(|count| count as usize)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text stored under `hash`, if any
    pub fn lookup(&self, hash: u32) -> Option<String> {
        let source = self.source.as_ref();
        let entries = source
            .read_ptr(layout::label_table_entries_address(self.table))
            .ok()
            .filter(|&p| p != 0)?;

        let (mut low, mut high) = (0, self.len());
        while low < high {
            let mid = low + (high - low) / 2;
            let entry = layout::label_entry_address(entries, mid);
            let entry_hash = source.read_u32(layout::label_entry_hash_address(entry)).ok()?;
            match entry_hash.cmp(&hash) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => {
                    let text = source
                        .read_ptr(layout::label_entry_text_address(entry))
                        .ok()
                        .filter(|&p| p != 0)?;
                    return Some(self.read_text(text));
                }
            }
        }
        None
    }

    /// Text stored under the label `name`
    pub fn text(&self, name: &str) -> Option<String> {
        self.lookup(joaat(name))
    }

    fn read_text(&self, address: usize) -> String {
        let bytes: Vec<u8> = (0..MAX_LABEL_LEN)
            .map_while(|i| self.source.read_u8(address + i).ok().filter(|&b| b != 0))
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
