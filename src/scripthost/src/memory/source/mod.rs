//! Memory Source Abstraction
//!
//! Core abstractions for reading memory from various sources:
//! - The current process via `LocalProcess`
//! - A module image file on disk via `MappedFile`
//! - Mock sources for testing

mod mapped;
mod mock;
mod process;
mod region;
mod traits;

pub use mapped::MappedFile;
pub use mock::MockMemorySource;
pub use process::{parse_maps, LocalProcess};
pub use region::MemoryRegion;
pub use traits::MemorySource;
