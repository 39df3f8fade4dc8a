//! The continue/wait handshake between one script worker and the driver
//!
//! At most one side runs at a time. The driver releases `resume` and blocks
//! on `wait`; the worker runs until it yields, releases `wait` and blocks on
//! `resume`. Each wake of the driver drains the worker's task queue before
//! anything else happens.
//!
//! A yield is either the end of the worker's slice, or a request to run
//! queued work on the driver and come straight back. The `request` flag
//! tells the two apart so a native call does not cost the script a frame.

use super::semaphore::Semaphore;
use super::task::{Task, TaskQueue};
use crate::host::HostState;

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

/// Scheduling state of one script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScriptState {
    NotStarted = 0,
    /// Worker spawned, waiting for its first slice
    Running = 1,
    /// Worker blocked, driver free
    Yielded = 2,
    /// Driver blocked, worker inside its slice
    Executing = 3,
    Aborting = 4,
    Stopped = 5,
}

impl ScriptState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ScriptState::NotStarted,
            1 => ScriptState::Running,
            2 => ScriptState::Yielded,
            3 => ScriptState::Executing,
            4 => ScriptState::Aborting,
            _ => ScriptState::Stopped,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ScriptState::Aborting | ScriptState::Stopped)
    }
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptState::NotStarted => "not started",
            ScriptState::Running => "running",
            ScriptState::Yielded => "yielded",
            ScriptState::Executing => "executing",
            ScriptState::Aborting => "aborting",
            ScriptState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// How a driver slice ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// Worker finished its slice and waits for the next tick
    Yielded,
    /// Worker exited
    Finished,
    /// Worker did not hand control back in time
    TimedOut,
}

/// Why a worker-side wait returned early
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    #[error("script was aborted")]
    Aborted,

    #[error("driver task panicked before producing a result")]
    TaskPanicked,
}

pub struct Fiber {
    resume: Semaphore,
    wait: Semaphore,
    tasks: TaskQueue,
    request: AtomicBool,
    aborted: AtomicBool,
    state: AtomicU8,
    stopped: Mutex<bool>,
    stopped_cond: Condvar,
}

impl Default for Fiber {
    fn default() -> Self {
        Self::new()
    }
}

impl Fiber {
    pub fn new() -> Self {
        Self {
            resume: Semaphore::new(),
            wait: Semaphore::new(),
            tasks: TaskQueue::new(),
            request: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            state: AtomicU8::new(ScriptState::NotStarted as u8),
            stopped: Mutex::new(false),
            stopped_cond: Condvar::new(),
        }
    }

    pub fn state(&self) -> ScriptState {
        ScriptState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` unless the fiber is already aborting or stopped
    fn advance(&self, next: ScriptState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (!ScriptState::from_u8(current).is_terminal()).then_some(next as u8)
            });
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn check_aborted(&self) -> Result<(), Interrupt> {
        if self.is_aborted() {
            Err(Interrupt::Aborted)
        } else {
            Ok(())
        }
    }

    // -- worker side --

    /// Mark the worker as spawned
    pub fn mark_running(&self) {
        self.advance(ScriptState::Running);
    }

    /// Block until the driver grants the first slice
    pub fn park(&self) -> Result<(), Interrupt> {
        self.resume.acquire();
        self.check_aborted()
    }

    /// Hand control to the driver and block until it grants another slice
    pub fn yield_now(&self) -> Result<(), Interrupt> {
        self.check_aborted()?;
        self.advance(ScriptState::Yielded);
        self.wait.release();
        self.resume.acquire();
        self.check_aborted()
    }

    /// Run `f` on the driving thread and return its result.
    ///
    /// The worker stays blocked until the driver has executed every task
    /// queued before this one, then this one.
    pub fn run_on_driver<R, F>(&self, f: F) -> Result<R, Interrupt>
    where
        R: Send + 'static,
        F: FnOnce(&mut HostState) -> R + Send + 'static,
    {
        self.check_aborted()?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.tasks.push(Box::new(move |host| {
            let _ = tx.send(f(host));
        }));
        self.request.store(true, Ordering::Release);
        self.yield_now()?;
        rx.try_recv().map_err(|_| Interrupt::TaskPanicked)
    }

    /// Queue `task` without waiting; it runs at this worker's next yield
    pub fn post(&self, task: Task) {
        self.tasks.push(task);
    }

    /// Worker exit: must be the last thing the worker does
    pub fn finish(&self) {
        self.state
            .store(ScriptState::Stopped as u8, Ordering::Release);
        *self.stopped.lock() = true;
        self.stopped_cond.notify_all();
        self.wait.release();
    }

    // -- driver side --

    /// Grant one slice and serve the worker's requests until it yields,
    /// exits or exceeds `timeout` on any single wait.
    pub fn service(&self, host: &Mutex<HostState>, timeout: Duration) -> SliceOutcome {
        if self.state() == ScriptState::Stopped {
            return SliceOutcome::Finished;
        }

        self.advance(ScriptState::Executing);
        self.resume.release();

        loop {
            if !self.wait.acquire_timeout(timeout) {
                return SliceOutcome::TimedOut;
            }

            let requested = self.request.swap(false, Ordering::AcqRel);
            {
                let mut host = host.lock();
                self.tasks.drain(&mut host);
            }

            if self.state() == ScriptState::Stopped {
                return SliceOutcome::Finished;
            }
            if !requested {
                return SliceOutcome::Yielded;
            }

            self.advance(ScriptState::Executing);
            self.resume.release();
        }
    }

    /// Flag the worker as aborted and release it from any wait
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.advance(ScriptState::Aborting);
        self.resume.release();
    }

    /// Wait up to `grace` for the worker to call [`Fiber::finish`]
    pub fn wait_stopped(&self, grace: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped && !grace.is_zero() {
            self.stopped_cond.wait_for(&mut stopped, grace);
        }
        *stopped
    }

    /// Drop queued work that will never be served
    pub fn discard_tasks(&self) -> usize {
        self.tasks.clear()
    }
}
