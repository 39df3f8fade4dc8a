//! # scripthost
//!
//! Script domain and native-call bridge for hosting user scripts inside a
//! game process.
//!
//! This library provides:
//! - Signature (byte pattern) scanning of the host module image to locate
//!   unexported functions and data tables
//! - Marshalling of typed arguments into the host's native-call ABI and
//!   decoding of the 64-bit result slot
//! - Handle validation and iteration over the host's entity pools
//! - A cooperative scheduler that multiplexes one worker thread per script
//!   onto the host's single driving thread
//! - Script discovery, dependency ordering and supervision
//!
//! ## Example
//!
//! ```no_run
//! use scripthost::domain::{ScriptDescriptor, ScriptDomain, ScriptRegistry};
//! use scripthost::native::{SimulatedHost, NO_ARGS};
//! use scripthost::script::{Script, ScriptContext, ScriptResult};
//! use scripthost::Config;
//!
//! #[derive(Default)]
//! struct Hello;
//!
//! impl Script for Hello {
//!     fn on_tick(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
//!         let time: i32 = ctx.call(0x9CD2_7B0C_5DA3_C8B4, NO_ARGS)?;
//!         println!("{} at {}", ctx.name(), time);
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> scripthost::Result<()> {
//! let mut registry = ScriptRegistry::new();
//! registry.add(ScriptDescriptor::new::<Hello>("Hello"));
//!
//! let mut domain = ScriptDomain::new(Config::default(), SimulatedHost::new())?;
//! domain.load(&registry)?;
//! domain.start()?;
//!
//! // Called by the host once per frame on its own thread
//! domain.tick();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod host;
pub mod memory;
pub mod native;
pub mod scheduler;
pub mod script;

#[doc(inline)]
pub use config::Config;
#[doc(inline)]
pub use domain::{DomainState, ScriptDomain};
#[doc(inline)]
pub use host::HostState;
#[doc(inline)]
pub use native::{NativeArg, NativeInvoker, OutputArgument, Vector3};
#[doc(inline)]
pub use script::{KeyEvent, Keys, Modifiers, Script, ScriptContext, ScriptError, ScriptResult};

/// Errors raised by the script domain and the native bridge
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Pattern not found: {name}")]
    PatternNotFound { name: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid cast: no native conversion for type `{type_name}`")]
    InvalidCast { type_name: String },

    #[error("Circular script dependency between: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error("Invalid domain state: expected {expected}, domain is {actual}")]
    InvalidState {
        expected: &'static str,
        actual: DomainState,
    },

    #[error("Unknown script type: {0}")]
    UnknownScript(String),

    #[error("Failed to start script {name}: {reason}")]
    ScriptStart { name: String, reason: String },

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an `InvalidCast` naming the offending Rust type
    pub fn invalid_cast<T: ?Sized>() -> Self {
        Error::InvalidCast {
            type_name: std::any::type_name::<T>().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PatternNotFound {
            name: "entity_pool".to_string(),
        };
        assert_eq!(err.to_string(), "Pattern not found: entity_pool");

        let err = Error::CircularDependency(vec!["A".into(), "B".into()]);
        assert!(err.to_string().contains("A, B"));
    }

    #[test]
    fn test_invalid_cast_names_type() {
        let err = Error::invalid_cast::<std::collections::HashMap<u8, u8>>();
        assert!(err.to_string().contains("HashMap"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = Error::InvalidState {
            expected: "Loaded",
            actual: DomainState::Created,
        };
        assert!(err.to_string().contains("Created"));
    }
}
