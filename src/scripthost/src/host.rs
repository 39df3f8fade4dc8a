//! Driving-thread state
//!
//! Everything that may only be touched on the host's driving thread lives
//! in [`HostState`]. Scripts never hold it directly: their requests are
//! queued as tasks and run against it by the driver.

use crate::memory::{LabelTable, PoolAccessor};
use crate::native::{
    FromNative, NativeArg, NativeCallFrame, NativeHost, NativeInvoker, RawResult, StringArena,
};
use crate::Result;

use parking_lot::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

pub struct HostState {
    pub invoker: NativeInvoker,
    pub strings: StringArena,
    pub pools: Option<PoolAccessor>,
    pub labels: Option<LabelTable>,
    executing: Option<String>,
}

impl HostState {
    pub fn new(host: impl NativeHost + 'static) -> Self {
        Self {
            invoker: NativeInvoker::new(host),
            strings: StringArena::new(),
            pools: None,
            labels: None,
            executing: None,
        }
    }

    pub fn with_pools(mut self, pools: PoolAccessor) -> Self {
        self.pools = Some(pools);
        self
    }

    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn execute(&mut self, frame: NativeCallFrame) -> RawResult {
        self.invoker.execute(frame, &mut self.strings)
    }

    pub fn call<T, I>(&mut self, hash: u64, args: I) -> Result<T>
    where
        T: FromNative,
        I: IntoIterator,
        I::Item: Into<NativeArg>,
    {
        self.invoker.call(&mut self.strings, hash, args)
    }

    pub fn pools(&self) -> Option<&PoolAccessor> {
        self.pools.as_ref()
    }

    pub fn labels(&self) -> Option<&LabelTable> {
        self.labels.as_ref()
    }

    /// Script whose slice the driver is currently servicing
    pub fn executing_script(&self) -> Option<&str> {
        self.executing.as_deref()
    }

    pub(crate) fn set_executing(&mut self, name: Option<String>) {
        self.executing = name;
    }
}

/// Host state plus the identity of the thread allowed to drive it
pub struct SharedHost {
    state: Mutex<HostState>,
    driver: Mutex<Option<ThreadId>>,
}

impl SharedHost {
    pub fn new(state: HostState) -> Self {
        Self {
            state: Mutex::new(state),
            driver: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Mutex<HostState> {
        &self.state
    }

    pub fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock()
    }

    /// Record the calling thread as the driving thread
    pub fn bind_driver(&self) {
        let current = thread::current().id();
        let mut driver = self.driver.lock();
        if *driver != Some(current) {
            if driver.is_some() {
                tracing::warn!("driving thread changed");
            }
            *driver = Some(current);
        }
    }

    pub fn is_driving_thread(&self) -> bool {
        *self.driver.lock() == Some(thread::current().id())
    }
}
