//! Script authoring surface
//!
//! A script is any `Send` type implementing [`Script`]. Each instance runs
//! on its own worker thread and talks to the host only through the
//! [`ScriptContext`] it is handed.

mod context;
mod keys;
mod settings;

pub use context::ScriptContext;
pub use keys::{KeyEvent, Keys, Modifiers};
pub use settings::ScriptSettings;

use crate::scheduler::Interrupt;
use std::any::Any;

/// Errors a script body can return
#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    /// The script was aborted; unwinds the worker loop
    #[error("script aborted")]
    Aborted,

    #[error("driver task panicked")]
    TaskPanicked,

    #[error(transparent)]
    Native(#[from] crate::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<Interrupt> for ScriptError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Aborted => ScriptError::Aborted,
            Interrupt::TaskPanicked => ScriptError::TaskPanicked,
        }
    }
}

pub type ScriptResult<T = ()> = std::result::Result<T, ScriptError>;

/// User extension point
///
/// Every callback runs on the script's worker thread. Returning an error
/// (or panicking) stops this script only.
#[allow(unused_variables)]
pub trait Script: Send + 'static {
    /// Runs once, inside the first slice, before any tick
    fn on_start(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        Ok(())
    }

    /// Runs once per interval
    fn on_tick(&mut self, ctx: &mut ScriptContext) -> ScriptResult;

    fn on_key_down(&mut self, ctx: &mut ScriptContext, event: KeyEvent) -> ScriptResult {
        Ok(())
    }

    fn on_key_up(&mut self, ctx: &mut ScriptContext, event: KeyEvent) -> ScriptResult {
        Ok(())
    }

    /// Runs on the worker after the script stops for any reason.
    /// Native calls are no longer possible here.
    fn on_aborted(&mut self, ctx: &ScriptContext) {}
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_conversion() {
        assert!(matches!(
            ScriptError::from(Interrupt::Aborted),
            ScriptError::Aborted
        ));
        assert!(matches!(
            ScriptError::from(Interrupt::TaskPanicked),
            ScriptError::TaskPanicked
        ));
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
