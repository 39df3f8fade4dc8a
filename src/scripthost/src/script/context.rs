//! Per-script handle to the scheduler and host

use super::keys::KeyEvent;
use super::settings::ScriptSettings;
use super::{ScriptError, ScriptResult};
use crate::host::{HostState, SharedHost};
use crate::memory::PoolAccessor;
use crate::native::{FromNative, NativeArg, NativeCallFrame};
use crate::scheduler::{Fiber, ScriptState};

use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything a running script can do.
///
/// Calls that must happen on the driving thread are queued on the script's
/// fiber; the worker blocks until the driver has run them. On the driving
/// thread itself they run immediately.
pub struct ScriptContext {
    name: String,
    fiber: Arc<Fiber>,
    host: Arc<SharedHost>,
    keys: Receiver<KeyEvent>,
    interval: Duration,
    settings_path: Option<PathBuf>,
    settings: Option<ScriptSettings>,
}

impl ScriptContext {
    pub(crate) fn new(
        name: String,
        fiber: Arc<Fiber>,
        host: Arc<SharedHost>,
        keys: Receiver<KeyEvent>,
        settings_path: Option<PathBuf>,
    ) -> Self {
        Self {
            name,
            fiber,
            host,
            keys,
            interval: Duration::ZERO,
            settings_path,
            settings: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ScriptState {
        self.fiber.state()
    }

    /// Minimum time between ticks; zero means every host tick
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, ms: u64) {
        self.interval = Duration::from_millis(ms);
    }

    pub fn is_driving_thread(&self) -> bool {
        self.host.is_driving_thread()
    }

    /// Give up the rest of this tick
    pub fn yield_now(&self) -> ScriptResult {
        Ok(self.fiber.yield_now()?)
    }

    /// Yield until at least `ms` milliseconds have passed; always yields once
    pub fn wait(&self, ms: u64) -> ScriptResult {
        self.wait_for(Duration::from_millis(ms))
    }

    pub fn wait_for(&self, duration: Duration) -> ScriptResult {
        let deadline = Instant::now() + duration;
        loop {
            self.yield_now()?;
            if Instant::now() >= deadline {
                return Ok(());
            }
        }
    }

    /// Run `f` against the host state on the driving thread
    pub fn run_on_driver<R, F>(&self, f: F) -> ScriptResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut HostState) -> R + Send + 'static,
    {
        if self.host.is_driving_thread() {
            let mut host = self.host.lock();
            return Ok(f(&mut host));
        }
        Ok(self.fiber.run_on_driver(f)?)
    }

    /// Queue `f` for the driving thread without waiting for it
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce(&mut HostState) + Send + 'static,
    {
        if self.host.is_driving_thread() {
            f(&mut self.host.lock());
        } else {
            self.fiber.post(Box::new(f));
        }
    }

    /// Call a native and decode its result as `T`
    pub fn call<T, I>(&self, hash: u64, args: I) -> ScriptResult<T>
    where
        T: FromNative + Send + 'static,
        I: IntoIterator,
        I::Item: Into<NativeArg>,
    {
        let frame = NativeCallFrame::new(hash, args);
        self.run_on_driver(move |host| host.execute(frame).decode::<T>())?
            .map_err(ScriptError::Native)
    }

    /// Call a native for its side effects only
    pub fn invoke<I>(&self, hash: u64, args: I) -> ScriptResult
    where
        I: IntoIterator,
        I::Item: Into<NativeArg>,
    {
        self.call::<(), I>(hash, args)
    }

    /// Run `f` against the pool accessor on the driving thread; `None` when
    /// no pools were configured
    pub fn with_pools<R, F>(&self, f: F) -> ScriptResult<Option<R>>
    where
        R: Send + 'static,
        F: FnOnce(&PoolAccessor) -> R + Send + 'static,
    {
        self.run_on_driver(move |host| host.pools().map(f))
    }

    /// Host label text for `name`; `None` when the label is unknown or no
    /// label table is attached
    pub fn label_text(&self, name: &str) -> ScriptResult<Option<String>> {
        let name = name.to_string();
        self.run_on_driver(move |host| host.labels().and_then(|labels| labels.text(&name)))
    }

    /// Settings file next to the script, loaded on first use
    pub fn settings(&mut self) -> &mut ScriptSettings {
        let path = self.settings_path.clone();
        let name = &self.name;
        self.settings.get_or_insert_with(|| match path {
            Some(path) => ScriptSettings::load_or_default(&path).unwrap_or_else(|err| {
                tracing::warn!(script = %name, path = %path.display(), error = %err, "failed to load settings");
                ScriptSettings::new()
            }),
            None => ScriptSettings::new(),
        })
    }

    /// Stop this script. Returns `Err(Aborted)` so the body can `?` out.
    pub fn abort(&self) -> ScriptResult {
        tracing::info!(script = %self.name, "script requested abort");
        self.fiber.abort();
        Err(ScriptError::Aborted)
    }

    pub(crate) fn next_key_event(&self) -> Option<KeyEvent> {
        self.keys.try_recv().ok()
    }

    pub(crate) fn fiber(&self) -> &Arc<Fiber> {
        &self.fiber
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{CallArgs, SimulatedHost};
    use crate::scheduler::SliceOutcome;
    use crate::script::Keys;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn shared() -> Arc<SharedHost> {
        let host = SimulatedHost::new().with_native(9, |args: &CallArgs| args.int(0) * 2);
        Arc::new(SharedHost::new(HostState::new(host)))
    }

    fn context(host: &Arc<SharedHost>) -> (ScriptContext, crossbeam_channel::Sender<KeyEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let ctx = ScriptContext::new(
            "Test".to_string(),
            Arc::new(Fiber::new()),
            Arc::clone(host),
            rx,
            None,
        );
        (ctx, tx)
    }

    #[test]
    fn test_driving_thread_short_circuit() {
        let host = shared();
        host.bind_driver();
        let (ctx, _) = context(&host);

        // No worker and no service loop: would deadlock without the short-circuit
        assert!(ctx.is_driving_thread());
        assert_eq!(ctx.call::<i32, _>(9, [21]).unwrap(), 42);
        let hit = Arc::new(parking_lot::Mutex::new(false));
        let flag = Arc::clone(&hit);
        ctx.post(move |_| *flag.lock() = true);
        assert!(*hit.lock());
    }

    #[test]
    fn test_call_from_worker_runs_on_driver() {
        let host = shared();
        host.bind_driver();
        let (ctx, _) = context(&host);
        let fiber = Arc::clone(ctx.fiber());

        let worker = thread::spawn(move || {
            ctx.fiber().park().unwrap();
            let value = ctx.call::<i32, _>(9, [5]);
            ctx.fiber().finish();
            value.unwrap()
        });

        assert_eq!(fiber.service(host.state(), TIMEOUT), SliceOutcome::Finished);
        assert_eq!(worker.join().unwrap(), 10);
        assert_eq!(host.lock().invoker.calls(), 1);
    }

    #[test]
    fn test_self_abort() {
        let host = shared();
        let (ctx, _) = context(&host);
        assert!(matches!(ctx.abort(), Err(ScriptError::Aborted)));
        assert!(ctx.fiber().is_aborted());
        assert!(matches!(ctx.yield_now(), Err(ScriptError::Aborted)));
    }

    #[test]
    fn test_key_queue_and_settings() {
        let host = shared();
        let (mut ctx, keys) = context(&host);
        keys.send(KeyEvent::down(Keys::F1)).unwrap();
        keys.send(KeyEvent::up(Keys::F1)).unwrap();
        assert_eq!(ctx.next_key_event(), Some(KeyEvent::down(Keys::F1)));
        assert_eq!(ctx.next_key_event(), Some(KeyEvent::up(Keys::F1)));
        assert_eq!(ctx.next_key_event(), None);

        ctx.set_interval(250);
        assert_eq!(ctx.interval(), Duration::from_millis(250));
        ctx.settings().set("Main", "Speed", 3);
        assert_eq!(ctx.settings().get_or("Main", "Speed", 0), 3);
    }

    #[test]
    fn test_settings_loaded_lazily_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Test.ini");
        std::fs::write(&path, "[Main]\nGreeting = hi\n").unwrap();

        let (_, rx) = crossbeam_channel::unbounded();
        let mut ctx = ScriptContext::new("Test".into(), Arc::new(Fiber::new()), shared(), rx, Some(path));
        assert_eq!(
            ctx.settings().get_or("Main", "Greeting", String::new()),
            "hi"
        );
    }
}
