//! CLI argument definitions for scripthost
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;

pub use core::{Cli, Commands};
