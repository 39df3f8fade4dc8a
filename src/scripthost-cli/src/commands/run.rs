//! Drive the demo scripts against a simulated host

use super::demo;
use anyhow::{Context, Result};
use scripthost::script::{KeyEvent, Keys};
use scripthost::{Config, ScriptDomain};
use std::thread;
use std::time::Duration;

pub struct RunOptions {
    pub ticks: u32,
    pub tick_ms: u64,
    pub press: Vec<String>,
    pub hang: bool,
    pub timeout_ms: Option<u64>,
}

fn parse_keys(names: &[String]) -> Result<Vec<Keys>> {
    names
        .iter()
        .map(|name| {
            name.parse::<Keys>()
                .with_context(|| format!("Unknown key '{}'", name))
        })
        .collect()
}

pub fn handle(mut config: Config, options: RunOptions) -> Result<()> {
    if let Some(ms) = options.timeout_ms {
        config.script_timeout_ms = ms;
    }
    let presses = parse_keys(&options.press)?;

    let mut domain = ScriptDomain::new(config, demo::simulated_host())?;
    let loaded = domain.load(&demo::registry(options.hang))?;
    let started = domain.start()?;
    println!("Loaded {} script(s), started {}", loaded, started);

    let frame = Duration::from_millis(options.tick_ms);
    for tick in 0..options.ticks {
        if let Some(&key) = presses.get(tick as usize) {
            domain.record_key(KeyEvent::down(key));
            domain.record_key(KeyEvent::up(key));
        }
        domain.tick();
        if domain.running_scripts().is_empty() {
            println!("All scripts stopped after {} tick(s)", tick + 1);
            break;
        }
        thread::sleep(frame);
    }

    let calls = domain.with_host(|host| host.invoker.calls());
    println!("Still running: {}", domain.running_scripts().join(", "));
    println!("Native calls:  {}", calls);

    domain.unload();
    Ok(())
}
