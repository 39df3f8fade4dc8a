//! Work queued for the driving thread

use crate::host::HostState;

use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};

/// A closure that must run on the driving thread
pub type Task = Box<dyn FnOnce(&mut HostState) + Send>;

/// FIFO of tasks from one script worker to the driver
pub struct TaskQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, task: Task) {
        // Both ends live in self, so the channel cannot be disconnected
        let _ = self.tx.send(task);
    }

    pub fn pop(&self) -> Option<Task> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Run every queued task in order. A panicking task is logged and
    /// skipped; its result channel is dropped so the waiting worker sees it.
    /// Returns the number of tasks run.
    pub fn drain(&self, host: &mut HostState) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop() {
            ran += 1;
            if panic::catch_unwind(AssertUnwindSafe(|| task(host))).is_err() {
                tracing::error!(
                    script = host.executing_script().unwrap_or("<none>"),
                    "driver task panicked"
                );
            }
        }
        ran
    }

    /// Drop every pending task without running it
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}
