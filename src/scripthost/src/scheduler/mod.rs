//! Cooperative scheduling between script workers and the driving thread
//!
//! Each script runs on its own OS thread but only executes while the
//! driving thread has handed it a slice. Anything that must happen on the
//! driving thread is queued as a [`Task`] and drained by the driver while
//! the worker is blocked.

mod fiber;
mod semaphore;
mod task;

pub use fiber::{Fiber, Interrupt, ScriptState, SliceOutcome};
pub use semaphore::Semaphore;
pub use task::{Task, TaskQueue};
