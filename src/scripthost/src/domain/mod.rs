//! Script domain lifecycle and supervision
//!
//! A [`ScriptDomain`] owns every running script and the driving-thread
//! state. The host calls [`ScriptDomain::tick`] once per frame and
//! [`ScriptDomain::record_key`] per raw key transition, both from its own
//! thread; nothing else in the domain needs to be called from there.
//!
//! ## Module Structure
//!
//! - `loader` - Script discovery and factories
//! - `sort` - Dependency ordering
//! - `instance` - One running script and its worker thread

mod instance;
mod loader;
mod sort;

pub use instance::ScriptInstance;
pub use loader::{ScriptDescriptor, ScriptFactory, ScriptLoader, ScriptRecord, ScriptRegistry};
pub use sort::sort_by_dependencies;

use crate::config::Config;
use crate::host::{HostState, SharedHost};
use crate::native::{FromNative, NativeArg, NativeHost};
use crate::scheduler::SliceOutcome;
use crate::script::KeyEvent;
use crate::{Error, Result};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How long an explicit abort waits for a worker to exit before detaching it
const ABORT_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainState {
    Created,
    Loading,
    /// Scripts discovered and ordered, none running yet
    Loaded,
    Started,
    Unloading,
    Disposed,
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct ScriptDomain {
    config: Config,
    state: DomainState,
    host: Arc<SharedHost>,
    records: Vec<ScriptRecord>,
    scripts: Vec<ScriptInstance>,
    record_keys: bool,
}

impl ScriptDomain {
    /// Create a domain driving `host`. The calling thread becomes the
    /// driving thread until another thread calls [`ScriptDomain::tick`].
    pub fn new(config: Config, host: impl NativeHost + 'static) -> Result<Self> {
        Self::with_host_state(config, HostState::new(host))
    }

    /// Create a domain around prepared host state (e.g. with pools attached)
    pub fn with_host_state(config: Config, state: HostState) -> Result<Self> {
        if config.script_timeout_ms == 0 {
            return Err(Error::Config(
                "script_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let host = Arc::new(SharedHost::new(state));
        host.bind_driver();

        tracing::info!(
            scripts_dir = %config.scripts_dir.display(),
            timeout_ms = config.script_timeout_ms,
            "script domain created"
        );

        Ok(Self {
            record_keys: config.record_keys,
            config,
            state: DomainState::Created,
            host,
            records: Vec::new(),
            scripts: Vec::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> DomainState {
        self.state
    }

    fn expect_state(&self, expected: DomainState, name: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected: name,
                actual: self.state,
            })
        }
    }

    /// Discover scripts with `loader` and order them by dependency.
    ///
    /// A circular dependency fails the whole load and leaves the domain
    /// back in `Created` with nothing recorded.
    pub fn load(&mut self, loader: &dyn ScriptLoader) -> Result<usize> {
        self.expect_state(DomainState::Created, "Created")?;
        self.state = DomainState::Loading;

        let loaded = loader
            .discover(&self.config.scripts_dir)
            .and_then(sort_by_dependencies);

        match loaded {
            Ok(records) => {
                let count = records.len();
                self.records = records;
                self.state = DomainState::Loaded;
                tracing::info!(count, "scripts loaded");
                Ok(count)
            }
            Err(err) => {
                tracing::error!(error = %err, "script load failed");
                self.state = DomainState::Created;
                Err(err)
            }
        }
    }

    /// Start every loaded script in dependency order. Scripts whose
    /// construction fails are logged and skipped. Returns how many started.
    pub fn start(&mut self) -> Result<usize> {
        self.expect_state(DomainState::Loaded, "Loaded")?;
        self.host.bind_driver();

        let records = self.records.clone();
        for record in &records {
            if let Err(err) = self.spawn(record) {
                tracing::error!(script = %record.type_name, error = %err, "failed to start script");
            }
        }

        self.state = DomainState::Started;
        tracing::info!(running = self.scripts.len(), "script domain started");
        Ok(self.scripts.len())
    }

    /// Start one more instance of a loaded script type
    pub fn start_script(&mut self, type_name: &str) -> Result<()> {
        self.expect_state(DomainState::Started, "Started")?;
        let record = self
            .records
            .iter()
            .find(|r| r.type_name == type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownScript(type_name.to_string()))?;
        self.spawn(&record)
    }

    fn spawn(&mut self, record: &ScriptRecord) -> Result<()> {
        let settings = record.settings_path(&self.config.scripts_dir);
        let instance = ScriptInstance::spawn(record, Arc::clone(&self.host), Some(settings))?;
        tracing::info!(script = %record.type_name, "script started");
        self.scripts.push(instance);
        Ok(())
    }

    /// Service every running script once, in start order.
    ///
    /// Must be called from the host's driving thread. A script that exits
    /// is reaped; one that does not hand control back within the configured
    /// timeout is aborted and never serviced again. Pinned strings created
    /// during the tick are released at the end.
    pub fn tick(&mut self) {
        if self.state != DomainState::Started {
            return;
        }
        self.host.bind_driver();

        let timeout = self.config.script_timeout();
        let host = Arc::clone(&self.host);

        self.scripts.retain_mut(|script| {
            host.lock().set_executing(Some(script.name().to_string()));
            match script.service(&host, timeout) {
                SliceOutcome::Yielded => true,
                SliceOutcome::Finished => {
                    script.join();
                    tracing::debug!(script = %script.name(), "script removed");
                    false
                }
                SliceOutcome::TimedOut => {
                    tracing::error!(
                        script = %script.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "script is unresponsive; aborting"
                    );
                    script.abort(Duration::ZERO);
                    false
                }
            }
        });

        let mut state = host.lock();
        state.set_executing(None);
        let freed = state.strings.end_tick();
        if freed > 0 {
            tracing::trace!(freed, "released pinned strings");
        }
    }

    /// Fan a key transition out to every running script
    pub fn record_key(&self, event: KeyEvent) {
        if !self.record_keys {
            return;
        }
        for script in &self.scripts {
            script.send_key(event);
        }
    }

    /// Pause or resume key recording; already-queued events are still delivered
    pub fn set_key_recording(&mut self, enabled: bool) {
        self.record_keys = enabled;
    }

    pub fn is_recording_keys(&self) -> bool {
        self.record_keys
    }

    /// Abort every running instance named `name`; returns whether any was found
    pub fn abort_script(&mut self, name: &str) -> bool {
        let before = self.scripts.len();
        self.scripts.retain_mut(|script| {
            if script.name() == name {
                script.abort(ABORT_GRACE);
                false
            } else {
                true
            }
        });
        self.scripts.len() != before
    }

    pub fn abort_all(&mut self) {
        for script in &mut self.scripts {
            script.abort(ABORT_GRACE);
        }
        if !self.scripts.is_empty() {
            tracing::info!(count = self.scripts.len(), "aborted all scripts");
        }
        self.scripts.clear();
        self.host.lock().set_executing(None);
    }

    /// Abort everything and release domain resources. Idempotent.
    pub fn unload(&mut self) {
        if self.state == DomainState::Disposed {
            return;
        }
        self.state = DomainState::Unloading;
        self.abort_all();
        self.records.clear();
        let freed = self.host.lock().strings.end_tick();
        self.state = DomainState::Disposed;
        tracing::info!(freed_strings = freed, "script domain unloaded");
    }

    /// Names of running scripts, in service order
    pub fn running_scripts(&self) -> Vec<&str> {
        self.scripts.iter().map(|s| s.name()).collect()
    }

    pub fn executing_script(&self) -> Option<String> {
        self.host.lock().executing_script().map(str::to_string)
    }

    pub fn records(&self) -> &[ScriptRecord] {
        &self.records
    }

    /// Call a native from the driving thread
    pub fn call<T, I>(&self, hash: u64, args: I) -> Result<T>
    where
        T: FromNative,
        I: IntoIterator,
        I::Item: Into<NativeArg>,
    {
        if !self.host.is_driving_thread() {
            tracing::warn!(hash = format_args!("{:#018x}", hash), "native called off the driving thread");
        }
        self.host.lock().call(hash, args)
    }

    /// Run `f` against the host state
    pub fn with_host<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        f(&mut self.host.lock())
    }
}

impl Drop for ScriptDomain {
    fn drop(&mut self) {
        self.unload();
    }
}
