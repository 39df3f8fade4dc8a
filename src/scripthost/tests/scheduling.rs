//! Domain-level scheduling behavior, driven through the public API

use parking_lot::Mutex;
use scripthost::domain::{ScriptDomain, ScriptRegistry};
use scripthost::native::{CallArgs, NativeCallFrame, SimulatedHost};
use scripthost::script::{KeyEvent, Keys, Script, ScriptContext, ScriptResult};
use scripthost::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Log = Arc<Mutex<Vec<String>>>;

fn config(timeout_ms: u64) -> Config {
    Config {
        scripts_dir: "/nonexistent/scripts".into(),
        script_timeout_ms: timeout_ms,
        ..Config::default()
    }
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

/// Logs each tick; optionally posts driver tasks that log too
struct Worker {
    name: &'static str,
    log: Log,
    tasks: usize,
}

impl Script for Worker {
    fn on_tick(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        self.log.lock().push(format!("{} tick", self.name));
        for i in 0..self.tasks {
            let log = Arc::clone(&self.log);
            let name = self.name;
            ctx.post(move |_| log.lock().push(format!("{name} task {i}")));
        }
        Ok(())
    }
}

fn worker(registry: &mut ScriptRegistry, log: &Log, name: &'static str, tasks: usize) {
    let log = Arc::clone(log);
    registry.register_with(name, None, &[], move || {
        Ok(Box::new(Worker {
            name,
            log: Arc::clone(&log),
            tasks,
        }) as Box<dyn Script>)
    });
}

#[test]
fn test_task_queue_fifo_and_isolation() {
    let log = Log::default();
    let mut registry = ScriptRegistry::new();
    worker(&mut registry, &log, "A", 0);
    worker(&mut registry, &log, "B", 5);
    worker(&mut registry, &log, "C", 0);

    let mut domain = ScriptDomain::new(config(5000), SimulatedHost::new()).unwrap();
    domain.load(&registry).unwrap();
    assert_eq!(domain.start().unwrap(), 3);

    domain.tick();
    assert_eq!(
        entries(&log),
        vec![
            "A tick", "B tick", "B task 0", "B task 1", "B task 2", "B task 3", "B task 4",
            "C tick",
        ]
    );

    log.lock().clear();
    domain.tick();
    assert_eq!(entries(&log).len(), 8);
    assert_eq!(entries(&log)[7], "C tick");
}

struct Hung {
    release: Arc<AtomicBool>,
}

impl Script for Hung {
    fn on_tick(&mut self, _: &mut ScriptContext) -> ScriptResult {
        while !self.release.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

#[test]
fn test_unresponsive_script_aborted_without_stalling_tick() {
    let log = Log::default();
    let release = Arc::new(AtomicBool::new(false));
    let mut registry = ScriptRegistry::new();
    {
        let release = Arc::clone(&release);
        registry.register_with("Hung", None, &[], move || {
            Ok(Box::new(Hung {
                release: Arc::clone(&release),
            }) as Box<dyn Script>)
        });
    }
    worker(&mut registry, &log, "After", 0);

    let mut domain = ScriptDomain::new(config(150), SimulatedHost::new()).unwrap();
    domain.load(&registry).unwrap();
    domain.start().unwrap();

    let started = Instant::now();
    domain.tick();
    assert!(started.elapsed() < Duration::from_secs(3));

    // The next script still got its slice in the same tick
    assert_eq!(entries(&log), vec!["After tick"]);
    assert_eq!(domain.running_scripts(), vec!["After"]);

    domain.tick();
    assert_eq!(entries(&log), vec!["After tick", "After tick"]);

    release.store(true, Ordering::Release);
}

struct KeyLogger {
    name: &'static str,
    log: Log,
    ticks: usize,
}

impl Script for KeyLogger {
    fn on_tick(&mut self, _: &mut ScriptContext) -> ScriptResult {
        self.ticks += 1;
        self.log.lock().push(format!("{} tick {}", self.name, self.ticks));
        Ok(())
    }

    fn on_key_down(&mut self, _: &mut ScriptContext, event: KeyEvent) -> ScriptResult {
        self.log.lock().push(format!("{} down {}", self.name, event.key));
        Ok(())
    }

    fn on_key_up(&mut self, _: &mut ScriptContext, event: KeyEvent) -> ScriptResult {
        self.log.lock().push(format!("{} up {}", self.name, event.key));
        Ok(())
    }
}

#[test]
fn test_key_events_fan_out_in_order() {
    let logs: Vec<Log> = vec![Log::default(), Log::default()];
    let mut registry = ScriptRegistry::new();
    for (name, log) in ["First", "Second"].into_iter().zip(&logs) {
        let log = Arc::clone(log);
        registry.register_with(name, None, &[], move || {
            Ok(Box::new(KeyLogger {
                name,
                log: Arc::clone(&log),
                ticks: 0,
            }) as Box<dyn Script>)
        });
    }

    let mut domain = ScriptDomain::new(config(5000), SimulatedHost::new()).unwrap();
    domain.load(&registry).unwrap();
    domain.start().unwrap();
    domain.tick();

    let g = Keys::letter('G').unwrap();
    domain.record_key(KeyEvent::down(g));
    domain.record_key(KeyEvent::up(g));
    domain.tick();

    // Paused recording drops new events but not queued ones
    domain.record_key(KeyEvent::down(Keys::ENTER));
    domain.set_key_recording(false);
    domain.record_key(KeyEvent::down(Keys::ESCAPE));
    domain.tick();

    for (name, log) in ["First", "Second"].into_iter().zip(&logs) {
        assert_eq!(
            entries(log),
            vec![
                format!("{name} tick 1"),
                format!("{name} down G"),
                format!("{name} up G"),
                format!("{name} tick 2"),
                format!("{name} down Enter"),
                format!("{name} tick 3"),
            ]
        );
    }
}

const ECHO: u64 = 0x6C18_8BE1_34E6_2A43;

/// Builds a call frame in one tick and only runs it in the next
struct Deferred {
    frame: Option<NativeCallFrame>,
    arena_sizes: Arc<Mutex<Vec<usize>>>,
}

impl Script for Deferred {
    fn on_tick(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        match self.frame.take() {
            None => {
                self.frame = Some(NativeCallFrame::new(ECHO, ["still here"]));
            }
            Some(frame) => {
                ctx.post(move |host| {
                    host.execute(frame);
                });
                let pinned = ctx.run_on_driver(|host| host.strings.len())?;
                self.arena_sizes.lock().push(pinned);
                ctx.abort()?;
            }
        }
        Ok(())
    }
}

#[test]
fn test_pinned_string_outlives_deferred_call() {
    let seen = Log::default();
    let echo_log = Arc::clone(&seen);
    let host = SimulatedHost::new().with_native(ECHO, move |args: &CallArgs| {
        echo_log.lock().push(unsafe { args.c_str(0) });
    });

    let arena_sizes = Arc::new(Mutex::new(Vec::new()));
    let sizes = Arc::clone(&arena_sizes);
    let mut registry = ScriptRegistry::new();
    registry.register_with("Deferred", None, &[], move || {
        Ok(Box::new(Deferred {
            frame: None,
            arena_sizes: Arc::clone(&sizes),
        }) as Box<dyn Script>)
    });

    let mut domain = ScriptDomain::new(config(5000), host).unwrap();
    domain.load(&registry).unwrap();
    domain.start().unwrap();

    domain.tick();
    assert!(entries(&seen).is_empty());
    assert_eq!(domain.with_host(|host| host.strings.len()), 0);

    domain.tick();
    assert_eq!(entries(&seen), vec!["still here"]);
    assert_eq!(*arena_sizes.lock(), vec![1]);
    assert_eq!(domain.with_host(|host| host.strings.len()), 0);
    assert!(domain.running_scripts().is_empty());
}
