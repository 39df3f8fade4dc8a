//! Signature Scanning
//!
//! Locates unexported functions and data tables in the host image by byte
//! signature. Each signature is a byte sequence plus a mask where `?` marks
//! a wildcard byte. The search anchors on the longest literal run with
//! memchr's SIMD `memmem` finder and verifies the full pattern at each hit.
//!
//! Scans run a bounded number of times at startup, never per tick.

use super::module::ModuleImage;
use super::source::MemorySource;
use crate::{Error, Result};

use byteorder::{ByteOrder, LE};
use std::fmt;

/// A byte signature with wildcards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<u8>,
    /// `true` where the byte must match
    mask: Vec<bool>,
}

impl Pattern {
    /// Build from raw bytes and a mask string (`x` = must match, `?` = wildcard)
    pub fn new(bytes: &[u8], mask: &str) -> Result<Self> {
        if bytes.len() != mask.len() {
            return Err(Error::InvalidPattern(format!(
                "{} bytes but mask has {} characters",
                bytes.len(),
                mask.len()
            )));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidPattern("empty pattern".to_string()));
        }

        let mask = mask
            .chars()
            .map(|c| match c {
                '?' => Ok(false),
                'x' | 'X' => Ok(true),
                other => Err(Error::InvalidPattern(format!("bad mask character {:?}", other))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bytes: bytes.to_vec(),
            mask,
        })
    }

    /// Parse IDA-style text: `"48 8B 05 ?? ?? ?? ?? 48 85 C0"`
    pub fn parse(text: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        let mut mask = Vec::new();

        for token in text.split_whitespace() {
            if token.chars().all(|c| c == '?') {
                bytes.push(0);
                mask.push(false);
                continue;
            }
            let byte = u8::from_str_radix(token, 16)
                .map_err(|_| Error::InvalidPattern(format!("bad byte {:?} in {:?}", token, text)))?;
            bytes.push(byte);
            mask.push(true);
        }

        if bytes.is_empty() {
            return Err(Error::InvalidPattern("empty pattern".to_string()));
        }

        Ok(Self { bytes, mask })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Mask as an `x`/`?` string
    pub fn mask_string(&self) -> String {
        self.mask.iter().map(|&m| if m { 'x' } else { '?' }).collect()
    }

    /// Check the full pattern (with wildcards) at the start of `data`
    #[inline]
    fn matches_at(&self, data: &[u8]) -> bool {
        data.len() >= self.bytes.len()
            && self
                .bytes
                .iter()
                .zip(&self.mask)
                .zip(data)
                .all(|((&expected, &literal), &actual)| !literal || expected == actual)
    }

    /// Longest contiguous run of literal bytes: (start_offset, bytes)
    fn best_anchor(&self) -> (usize, &[u8]) {
        let mut best = (0, 0);
        let mut run_start = 0;
        let mut run_len = 0;

        for (i, &literal) in self.mask.iter().enumerate() {
            if literal {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
                if run_len > best.1 {
                    best = (run_start, run_len);
                }
            } else {
                run_len = 0;
            }
        }

        (best.0, &self.bytes[best.0..best.0 + best.1])
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self
            .bytes
            .iter()
            .zip(&self.mask)
            .map(|(b, &m)| if m { format!("{:02X}", b) } else { "??".to_string() })
            .collect();
        write!(f, "{}", tokens.join(" "))
    }
}

/// Every offset in `data` where `pattern` matches, in ascending order
pub fn find_all(data: &[u8], pattern: &Pattern) -> Vec<usize> {
    let (anchor_offset, anchor) = pattern.best_anchor();

    if anchor.is_empty() {
        // All wildcards: every position with room for the pattern matches
        return (0..=data.len().saturating_sub(pattern.len()))
            .take_while(|_| data.len() >= pattern.len())
            .collect();
    }

    let finder = memchr::memmem::Finder::new(anchor);
    finder
        .find_iter(data)
        .filter_map(|anchor_pos| anchor_pos.checked_sub(anchor_offset))
        .filter(|&start| pattern.matches_at(&data[start..]))
        .collect()
}

/// First offset in `data` where `pattern` matches
pub fn find(data: &[u8], pattern: &Pattern) -> Option<usize> {
    let (anchor_offset, anchor) = pattern.best_anchor();

    if anchor.is_empty() {
        return (data.len() >= pattern.len()).then_some(0);
    }

    memchr::memmem::Finder::new(anchor)
        .find_iter(data)
        .filter_map(|anchor_pos| anchor_pos.checked_sub(anchor_offset))
        .find(|&start| pattern.matches_at(&data[start..]))
}

/// How a matched location becomes the final address
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resolve {
    /// `match + offset`
    Direct {
        #[serde(default)]
        offset: isize,
    },
    /// RIP-relative operand: `match + instruction_length + rel32`, where the
    /// signed 32-bit displacement is read at `match + displacement_offset`
    Relative {
        displacement_offset: usize,
        instruction_length: usize,
    },
}

impl Default for Resolve {
    fn default() -> Self {
        Resolve::Direct { offset: 0 }
    }
}

/// Scans one module image of a memory source
pub struct PatternScanner<'a> {
    source: &'a dyn MemorySource,
    module: ModuleImage,
    /// (start address, bytes) of each readable range inside the module
    chunks: Vec<(usize, Vec<u8>)>,
}

impl<'a> PatternScanner<'a> {
    /// Read the module image once; every subsequent search runs on the copy
    pub fn new(source: &'a dyn MemorySource, module: ModuleImage) -> Result<Self> {
        let mut ranges: Vec<(usize, usize)> = source
            .regions()
            .iter()
            .filter(|region| region.is_readable())
            .map(|region| (region.start.max(module.base), region.end.min(module.end())))
            .filter(|(start, end)| start < end)
            .collect();
        ranges.sort_unstable();

        // Adjacent mappings form one chunk so matches may straddle them
        let mut chunks: Vec<(usize, Vec<u8>)> = Vec::new();
        for (start, end) in ranges {
            let bytes = source.read_bytes(start, end - start)?;
            match chunks.last_mut() {
                Some((chunk_start, data)) if *chunk_start + data.len() == start => {
                    data.extend_from_slice(&bytes);
                }
                _ => chunks.push((start, bytes)),
            }
        }

        if chunks.is_empty() {
            return Err(Error::Memory(format!(
                "Module {:#x}+{:#x} has no readable memory",
                module.base, module.size
            )));
        }

        tracing::debug!(
            base = format_args!("{:#x}", module.base),
            size = format_args!("{:#x}", module.size),
            chunks = chunks.len(),
            "module image loaded for scanning"
        );

        Ok(Self {
            source,
            module,
            chunks,
        })
    }

    pub fn module(&self) -> ModuleImage {
        self.module
    }

    /// Absolute address of the first match, or `PatternNotFound`
    pub fn find(&self, pattern: &Pattern) -> Result<usize> {
        self.chunks
            .iter()
            .find_map(|(start, data)| find(data, pattern).map(|offset| start + offset))
            .ok_or_else(|| Error::PatternNotFound {
                name: pattern.to_string(),
            })
    }

    /// Absolute addresses of every match
    pub fn find_all(&self, pattern: &Pattern) -> Vec<usize> {
        self.chunks
            .iter()
            .flat_map(|(start, data)| find_all(data, pattern).into_iter().map(move |o| start + o))
            .collect()
    }

    /// Apply a resolution rule to a matched address
    pub fn apply(&self, matched: usize, resolve: Resolve) -> Result<usize> {
        match resolve {
            Resolve::Direct { offset } => Ok(matched.wrapping_add_signed(offset)),
            Resolve::Relative {
                displacement_offset,
                instruction_length,
            } => {
                let disp = self.read_i32(matched + displacement_offset)?;
                Ok((matched + instruction_length).wrapping_add_signed(disp as isize))
            }
        }
    }

    fn read_i32(&self, address: usize) -> Result<i32> {
        for (start, data) in &self.chunks {
            if address >= *start && address + 4 <= start + data.len() {
                let offset = address - start;
                return Ok(LE::read_i32(&data[offset..offset + 4]));
            }
        }
        self.source.read_i32(address)
    }
}
