//! One running script: its worker thread and the driver's handle on it

use super::loader::ScriptRecord;
use crate::host::SharedHost;
use crate::scheduler::{Fiber, ScriptState, SliceOutcome};
use crate::script::{panic_message, KeyEvent, Script, ScriptContext, ScriptError, ScriptResult};
use crate::{Error, Result};

use crossbeam_channel::Sender;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct ScriptInstance {
    name: String,
    fiber: Arc<Fiber>,
    keys: Sender<KeyEvent>,
    thread: Option<JoinHandle<()>>,
}

impl ScriptInstance {
    /// Construct the script and spawn its worker. The worker parks until
    /// the first [`ScriptInstance::service`].
    pub fn spawn(
        record: &ScriptRecord,
        host: Arc<SharedHost>,
        settings_path: Option<PathBuf>,
    ) -> Result<Self> {
        let name = record.type_name.clone();
        let script = record.instantiate().map_err(|e| Error::ScriptStart {
            name: name.clone(),
            reason: format!("{e:#}"),
        })?;

        let fiber = Arc::new(Fiber::new());
        let (keys, key_rx) = crossbeam_channel::unbounded();
        let ctx = ScriptContext::new(name.clone(), Arc::clone(&fiber), host, key_rx, settings_path);

        let thread = thread::Builder::new()
            .name(format!("script:{name}"))
            .spawn(move || run_worker(script, ctx))
            .map_err(|e| Error::ScriptStart {
                name: name.clone(),
                reason: format!("failed to spawn worker: {e}"),
            })?;
        fiber.mark_running();

        tracing::debug!(script = %name, "script worker spawned");
        Ok(Self {
            name,
            fiber,
            keys,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ScriptState {
        self.fiber.state()
    }

    pub fn is_finished(&self) -> bool {
        self.fiber.state() == ScriptState::Stopped
    }

    /// Queue a key event for the script's next slice
    pub fn send_key(&self, event: KeyEvent) {
        // The receiver lives until the worker exits; events after that are moot
        let _ = self.keys.send(event);
    }

    /// Run one slice of this script on the calling (driving) thread
    pub fn service(&self, host: &SharedHost, timeout: Duration) -> SliceOutcome {
        self.fiber.service(host.state(), timeout)
    }

    /// Stop the worker, waiting up to `grace` for it to exit.
    /// A worker that does not exit in time is detached.
    pub fn abort(&mut self, grace: Duration) {
        self.fiber.abort();
        if self.fiber.wait_stopped(grace) {
            self.join();
        } else if self.thread.take().is_some() {
            tracing::warn!(
                script = %self.name,
                grace_ms = grace.as_millis() as u64,
                "worker did not stop in time; detaching thread"
            );
        }

        let dropped = self.fiber.discard_tasks();
        if dropped > 0 {
            tracing::debug!(script = %self.name, dropped, "discarded pending tasks");
        }
    }

    /// Reap a worker that has already finished
    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(script = %self.name, "worker thread panicked outside the script body");
            }
        }
    }
}

impl Drop for ScriptInstance {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.abort(Duration::ZERO);
        }
    }
}

fn run_worker(mut script: Box<dyn Script>, mut ctx: ScriptContext) {
    let fiber = Arc::clone(ctx.fiber());
    let name = ctx.name().to_string();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_script(script.as_mut(), &mut ctx)));
    match outcome {
        Ok(Err(ScriptError::Aborted)) => tracing::info!(script = %name, "script aborted"),
        Ok(Err(err)) => tracing::error!(script = %name, error = %err, "script failed"),
        Ok(Ok(())) => tracing::info!(script = %name, "script finished"),
        Err(payload) => tracing::error!(
            script = %name,
            panic = %panic_message(payload.as_ref()),
            "script panicked"
        ),
    }

    // Later native calls see the abort flag and fail fast
    fiber.abort();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| script.on_aborted(&ctx))) {
        tracing::error!(
            script = %name,
            panic = %panic_message(payload.as_ref()),
            "on_aborted panicked"
        );
    }

    fiber.finish();
}

fn run_script(script: &mut dyn Script, ctx: &mut ScriptContext) -> ScriptResult {
    ctx.fiber().park()?;
    script.on_start(ctx)?;

    loop {
        while let Some(event) = ctx.next_key_event() {
            if event.down {
                script.on_key_down(ctx, event)?;
            } else {
                script.on_key_up(ctx, event)?;
            }
        }

        script.on_tick(ctx)?;
        ctx.wait_for(ctx.interval())?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostState;
    use crate::native::SimulatedHost;
    use crate::script::Keys;
    use parking_lot::Mutex;

    const TIMEOUT: Duration = Duration::from_secs(5);

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        log: Log,
        stop_after: usize,
        ticks: usize,
    }

    impl Script for Recorder {
        fn on_start(&mut self, _: &mut ScriptContext) -> ScriptResult {
            self.log.lock().push("start".into());
            Ok(())
        }

        fn on_tick(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
            self.ticks += 1;
            self.log.lock().push(format!("tick {}", self.ticks));
            if self.ticks == self.stop_after {
                return ctx.abort();
            }
            Ok(())
        }

        fn on_key_down(&mut self, _: &mut ScriptContext, event: KeyEvent) -> ScriptResult {
            self.log.lock().push(format!("down {}", event.key));
            Ok(())
        }

        fn on_key_up(&mut self, _: &mut ScriptContext, event: KeyEvent) -> ScriptResult {
            self.log.lock().push(format!("up {}", event.key));
            Ok(())
        }

        fn on_aborted(&mut self, _: &ScriptContext) {
            self.log.lock().push("aborted".into());
        }
    }

    fn recorder(log: &Log, stop_after: usize) -> ScriptRecord {
        let log = Arc::clone(log);
        ScriptRecord {
            path: None,
            type_name: "Recorder".into(),
            dependencies: Vec::new(),
            factory: Arc::new(move || {
                Ok(Box::new(Recorder {
                    log: Arc::clone(&log),
                    stop_after,
                    ticks: 0,
                }) as Box<dyn Script>)
            }),
        }
    }

    fn shared() -> Arc<SharedHost> {
        Arc::new(SharedHost::new(HostState::new(SimulatedHost::new())))
    }

    #[test]
    fn test_lifecycle_with_keys() {
        let host = shared();
        let log = Log::default();
        let mut script = ScriptInstance::spawn(&recorder(&log, 2), Arc::clone(&host), None).unwrap();
        assert_eq!(script.state(), ScriptState::Running);

        assert_eq!(script.service(&host, TIMEOUT), SliceOutcome::Yielded);
        script.send_key(KeyEvent::down(Keys::F1));
        script.send_key(KeyEvent::up(Keys::F1));
        assert_eq!(script.service(&host, TIMEOUT), SliceOutcome::Finished);
        assert!(script.is_finished());
        script.join();

        assert_eq!(
            *log.lock(),
            vec!["start", "tick 1", "down F1", "up F1", "tick 2", "aborted"]
        );
    }

    #[test]
    fn test_abort_parked_worker() {
        let host = shared();
        let log = Log::default();
        let mut script = ScriptInstance::spawn(&recorder(&log, 0), Arc::clone(&host), None).unwrap();

        script.abort(TIMEOUT);
        assert!(script.is_finished());
        // Never got a slice, so only the abort hook ran
        assert_eq!(*log.lock(), vec!["aborted"]);
    }

    #[test]
    fn test_failing_constructor() {
        let record = ScriptRecord {
            path: None,
            type_name: "Broken".into(),
            dependencies: Vec::new(),
            factory: Arc::new(|| anyhow::bail!("missing default constructor")),
        };
        match ScriptInstance::spawn(&record, shared(), None) {
            Err(Error::ScriptStart { name, reason }) => {
                assert_eq!(name, "Broken");
                assert!(reason.contains("missing default constructor"));
            }
            other => panic!("unexpected: {:?}", other.map(|s| s.name().to_string())),
        }
    }

    struct Panics;

    impl Script for Panics {
        fn on_tick(&mut self, _: &mut ScriptContext) -> ScriptResult {
            panic!("tick exploded");
        }
    }

    #[test]
    fn test_panicking_tick_stops_script() {
        let host = shared();
        let record = ScriptRecord {
            path: None,
            type_name: "Panics".into(),
            dependencies: Vec::new(),
            factory: Arc::new(|| Ok(Box::new(Panics) as Box<dyn Script>)),
        };
        let mut script = ScriptInstance::spawn(&record, Arc::clone(&host), None).unwrap();
        assert_eq!(script.service(&host, TIMEOUT), SliceOutcome::Finished);
        script.join();
        assert!(script.thread.is_none());
    }
}
