//! Command handlers for the scripthost CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod call;
pub mod configure;
pub mod demo;
pub mod run;
pub mod scan;
pub mod settings;
