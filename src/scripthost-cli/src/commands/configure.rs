//! Configuration command handlers

use anyhow::{Context, Result};
use scripthost::Config;
use std::path::{Path, PathBuf};

/// Fields the `configure` command can change
#[derive(Debug, Default)]
pub struct Changes {
    pub scripts_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Changes {
    fn is_empty(&self) -> bool {
        self.scripts_dir.is_none() && self.timeout_ms.is_none() && self.log_file.is_none()
    }
}

/// Handle the configure command
pub fn handle(path: &Path, changes: Changes, show: bool) -> Result<()> {
    let mut config = Config::load_or_default(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    if show {
        show_config(&config, path);
        return Ok(());
    }

    if changes.is_empty() {
        show_usage();
        return Ok(());
    }

    apply(&mut config, changes)?;
    config
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    println!("Config saved to: {}", path.display());

    Ok(())
}

fn apply(config: &mut Config, changes: Changes) -> Result<()> {
    if let Some(dir) = changes.scripts_dir {
        config.scripts_dir = dir;
    }
    if let Some(ms) = changes.timeout_ms {
        anyhow::ensure!(ms > 0, "Timeout must be greater than zero");
        config.script_timeout_ms = ms;
    }
    if let Some(file) = changes.log_file {
        config.log_file = Some(file);
    }
    Ok(())
}

fn show_config(config: &Config, path: &Path) {
    println!("Config file:    {}", path.display());
    println!("Scripts dir:    {}", config.scripts_dir.display());
    println!("Script timeout: {} ms", config.script_timeout_ms);
    println!("Record keys:    {}", config.record_keys);
    println!("Extensions:     {}", config.script_extensions.join(", "));
    match &config.log_file {
        Some(file) => println!("Log file:       {}", file.display()),
        None => println!("Log file:       (stderr)"),
    }
    if !config.signatures.is_empty() {
        println!("Signature overrides:");
        for (name, def) in &config.signatures {
            println!("  {:<24} {}", name, def.pattern);
        }
    }
}

fn show_usage() {
    println!("Usage: scripthost configure --scripts-dir DIR --timeout-ms MS --log-file FILE");
    println!("   or: scripthost configure --show");
}
