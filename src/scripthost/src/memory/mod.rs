//! Host memory access
//!
//! This module provides functionality to:
//! - Read memory from the current process, mapped files, or test buffers
//! - Locate the host module image and scan it for byte signatures
//! - Resolve the addresses every other subsystem depends on
//! - Validate pool handles and iterate live pool slots
//! - Look up label text in the host's label table
//!
//! ## Module Structure
//!
//! - `source` - Memory source abstraction (own process, mapped file, mock)
//! - `module` - Host module image bounds
//! - `pattern` - Signature scanning
//! - `signature` - Replaceable signature definitions and resolution
//! - `layout` - Host structure offsets, one accessor per field
//! - `pool` - Pool handles and slot iteration
//! - `labels` - Label text lookups by hash

pub mod labels;
pub mod layout;
pub mod module;
pub mod pattern;
pub mod pool;
pub mod signature;
pub mod source;

pub use module::ModuleImage;
pub use pattern::{Pattern, PatternScanner, Resolve};
pub use labels::{joaat, LabelTable};
pub use pool::{
    AddressSource, BitArrayPool, GenericPool, HandleSource, PoolAccessor, PoolFilter, PoolHandle,
    PoolKind, PoolLayout, PoolLocation,
};
pub use signature::{ResolvedAddresses, Signature, SignatureSet};
pub use source::{LocalProcess, MappedFile, MemoryRegion, MemorySource};
