//! Core CLI definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default virtual base for images scanned offline
const DEFAULT_BASE: &str = "0x140000000";

#[derive(Parser)]
#[command(name = "scripthost")]
#[command(about = "Script host tooling: signatures, simulated runs, native calls, settings", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "SCRIPTHOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search a module image for a byte pattern
    Scan {
        /// Module image file (raw dump or unpacked executable)
        image: PathBuf,

        /// Pattern text, e.g. "48 8B 05 ?? ?? ?? ??"
        pattern: String,

        /// Address the image is presented at
        #[arg(short, long, default_value = DEFAULT_BASE, value_parser = parse_address)]
        base: usize,

        /// Report every match instead of the first
        #[arg(short, long)]
        all: bool,

        /// Bytes to dump at each match
        #[arg(long, default_value = "16")]
        context: usize,
    },

    /// Resolve the built-in signature set (plus config overrides) against an image
    #[command(visible_alias = "r")]
    Resolve {
        /// Module image file
        image: PathBuf,

        #[arg(short, long, default_value = DEFAULT_BASE, value_parser = parse_address)]
        base: usize,

        /// Report each miss and continue instead of failing on the first
        #[arg(short, long)]
        keep_going: bool,
    },

    /// Run the demo scripts against a simulated host
    Run {
        /// Number of host ticks to drive
        #[arg(short, long, default_value = "120")]
        ticks: u32,

        /// Milliseconds between host ticks
        #[arg(long, default_value = "16")]
        tick_ms: u64,

        /// Keys to press, one per tick starting at the first tick (e.g. F5,G)
        #[arg(short, long, value_delimiter = ',')]
        press: Vec<String>,

        /// Also start a script that never yields, to exercise the timeout
        #[arg(long)]
        hang: bool,

        /// Override the per-script timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Call one native on the simulated host and print the decoded result
    Call {
        /// Native hash
        #[arg(value_parser = parse_address)]
        hash: usize,

        /// Arguments as type:value (bool, int, uint, long, float, str, hash, ped, vehicle)
        /// or untyped values
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,

        /// Result type name (void, bool, int, uint, float, string, vector3, ped, ...)
        #[arg(short, long, default_value = "void")]
        returns: String,
    },

    /// Show a script settings file
    #[command(visible_alias = "s")]
    Settings {
        /// Path to .ini file
        file: PathBuf,

        /// Only show this section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Directory searched for scripts
        #[arg(long)]
        scripts_dir: Option<PathBuf>,

        /// Per-script timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Default log file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

/// Parse a decimal or `0x`-prefixed hexadecimal address
pub fn parse_address(text: &str) -> Result<usize, String> {
    let text = text.trim().replace('_', "");
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", text, e))
}
